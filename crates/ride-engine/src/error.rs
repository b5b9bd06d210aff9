use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by command execution.
///
/// Validation problems and modification-prevented situations are *not*
/// errors: they publish an event and return a falsy result with no state
/// change. Everything here aborts the current operation and propagates to
/// the caller of `execute`.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid name: {0}")]
    Validation(String),

    #[error("directory contains unsaved changes")]
    DirtyData,

    #[error("no such target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("command {0} cannot synthesise an inverse")]
    MissingInverse(&'static str),
}

/// Errors reported by the parser/serialiser collaborator. Always carries
/// the file the failure belongs to.
#[derive(Debug, Error)]
#[error("{path}: {message}")]
pub struct ParseError {
    pub path: PathBuf,
    pub message: String,
}

impl ParseError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}
