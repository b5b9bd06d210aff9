//! Plain value types of the test-data model.
//!
//! These types hold fields and offer cell-level accessors; all behaviour
//! (mutation, events, dirtiness) lives in the controller and command
//! layers. Files own tables, tables own items, items own steps.

pub mod file;
pub mod item;
pub mod step;

pub use file::{DataFile, DataFileKind, FileFormat};
pub use item::{
    Import, ImportKind, SettingTable, TestCase, UserKeyword, Variable, VariableKind, VariableTable,
    name_taken,
};
pub use step::{BlockStep, Step};

/// Keyword-name normalisation used everywhere names are compared:
/// lowercase with spaces and underscores collapsed away, so
/// `Login User` ≡ `login_user` ≡ `LOGINUSER`.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case-insensitive comparison after normalisation.
pub fn eq_normalized(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}
