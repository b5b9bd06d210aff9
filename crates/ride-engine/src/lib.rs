pub mod commands;
pub mod controller;
pub mod error;
pub mod io;
pub mod library;
pub mod messages;
pub mod model;
pub mod namespace;
pub mod observer;
pub mod project;

// Re-export key types for easier usage
pub use commands::{Command, CommandOutput, CommandResult, Context};
pub use controller::{CtrlRef, FileNode, ItemRef, NodeId, NodeKind, NodeTree};
pub use error::{CommandError, ParseError};
pub use io::{DataParser, WriteOptions, serialize_file};
pub use library::{KeywordInfo, LibraryManager, StaticLibraryManager};
pub use messages::{Listener, ListenerId, Publisher, RideMessage};
pub use model::{DataFile, DataFileKind, FileFormat, Step, TestCase, UserKeyword, Variable};
pub use namespace::Namespace;
pub use observer::{LoadObserver, NullObserver};
pub use project::Project;
