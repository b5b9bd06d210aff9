//! Named items owned by a data file: tests, keywords, variables, imports
//! and the settings table.

use crate::model::step::Step;
use crate::model::{eq_normalized, normalize};
use ride_syntax::variables::{is_dict_variable, is_list_variable, variable_base};

/// A single test case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestCase {
    pub name: String,
    pub steps: Vec<Step>,
    pub doc: String,
    pub tags: Vec<String>,
    pub setup: Option<Step>,
    pub teardown: Option<Step>,
    pub template: Option<String>,
    pub timeout: Option<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A user keyword. Names may carry embedded `${…}` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserKeyword {
    pub name: String,
    pub args: Vec<String>,
    pub return_values: Vec<String>,
    pub steps: Vec<Step>,
    pub doc: String,
    pub tags: Vec<String>,
    pub timeout: Option<String>,
    pub teardown: Option<Step>,
}

impl UserKeyword {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    /// Whether the name contains embedded `${…}` argument placeholders.
    pub fn has_embedded_args(&self) -> bool {
        ride_syntax::variables::contains_variable(&self.name)
    }
}

/// Variable kind, derived from the name's sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Scalar,
    List,
    Dict,
}

/// A variable-table entry. The name keeps its sigil and braces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variable {
    pub name: String,
    pub values: Vec<String>,
    pub comment: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
            comment: None,
        }
    }

    pub fn kind(&self) -> VariableKind {
        if is_list_variable(&self.name) {
            VariableKind::List
        } else if is_dict_variable(&self.name) {
            VariableKind::Dict
        } else {
            VariableKind::Scalar
        }
    }

    /// Name without sigil and braces, used for uniqueness checks.
    pub fn base_name(&self) -> String {
        variable_base(&self.name).unwrap_or_else(|| self.name.clone())
    }

    /// Variable names collide case- and underscore-insensitively,
    /// regardless of sigil.
    pub fn matches_name(&self, other: &str) -> bool {
        let other_base = variable_base(other).unwrap_or_else(|| other.to_string());
        eq_normalized(&self.base_name(), &other_base)
    }
}

/// The variable table of a data file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableTable {
    pub variables: Vec<Variable>,
}

impl VariableTable {
    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.matches_name(name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.matches_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Library,
    Resource,
    Variables,
}

impl ImportKind {
    pub fn setting_name(self) -> &'static str {
        match self {
            ImportKind::Library => "Library",
            ImportKind::Resource => "Resource",
            ImportKind::Variables => "Variables",
        }
    }
}

/// An import setting row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub kind: ImportKind,
    pub name: String,
    pub args: Vec<String>,
    pub alias: Option<String>,
}

impl Import {
    pub fn library(name: impl Into<String>, args: Vec<String>, alias: Option<String>) -> Self {
        Self {
            kind: ImportKind::Library,
            name: name.into(),
            args,
            alias,
        }
    }

    pub fn resource(path: impl Into<String>) -> Self {
        Self {
            kind: ImportKind::Resource,
            name: path.into(),
            args: Vec::new(),
            alias: None,
        }
    }

    pub fn variables(path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind: ImportKind::Variables,
            name: path.into(),
            args,
            alias: None,
        }
    }

    /// The name a library is referred to by: its alias when present.
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Suite-level settings of a data file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingTable {
    pub doc: String,
    pub suite_setup: Option<Step>,
    pub suite_teardown: Option<Step>,
    pub test_setup: Option<Step>,
    pub test_teardown: Option<Step>,
    pub force_tags: Vec<String>,
    pub default_tags: Vec<String>,
    pub test_template: Option<String>,
    pub test_timeout: Option<String>,
    pub imports: Vec<Import>,
    pub metadata: Vec<(String, String)>,
}

impl SettingTable {
    pub fn resource_imports(&self) -> impl Iterator<Item = &Import> {
        self.imports
            .iter()
            .filter(|i| i.kind == ImportKind::Resource)
    }

    pub fn library_imports(&self) -> impl Iterator<Item = &Import> {
        self.imports
            .iter()
            .filter(|i| i.kind == ImportKind::Library)
    }
}

/// Normalised lookup over test/keyword names, shared by rename and
/// validation paths.
pub fn name_taken<'a, I>(names: I, candidate: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = normalize(candidate);
    names.into_iter().any(|n| normalize(n) == wanted)
}
