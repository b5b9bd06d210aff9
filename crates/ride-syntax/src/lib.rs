//! Line-level tokeniser for tabular keyword-driven test data.
//!
//! The crate is organised as a small pipeline:
//!
//! - [`row`] splits a single source row into cells and separators (two-space
//!   and pipe formats) without losing a byte;
//! - [`lexer`] is the Logos lexer for the in-cell variable sub-grammar;
//! - [`variables`] finds `${…}`/`@{…}`/`&{…}`/`%{…}` spans on top of the
//!   lexed tokens, with escape and nesting rules;
//! - [`tokenizer`] is the stateful table automaton that classifies rows and
//!   emits `(offset, kind, text)` triples for syntax colouring;
//! - [`language`] carries the BDD prefixes and localised table headers.

pub mod language;
pub mod lexer;
pub mod row;
pub mod syntax_kind;
pub mod tokenizer;
pub mod variables;

pub use language::LanguagePack;
pub use row::{RowCell, RowCellKind, split_row};
pub use syntax_kind::TokenKind;
pub use tokenizer::{Token, Tokenizer};
pub use variables::{VariableKind, VariableMatch, find_variables, search_variable};
