//! Steps: the rows inside a test case or user keyword body.

use ride_syntax::variables::is_variable;

/// Block and loop markers that open an indented region.
pub const INDENT_STARTERS: &[&str] = &["FOR", "IF", "WHILE", "TRY", "GROUP"];

/// Markers that both close and reopen an indented region.
pub const INDENT_CONTINUATIONS: &[&str] = &["ELSE", "ELSE IF", "EXCEPT", "FINALLY"];

/// Marker closing an indented region.
pub const END_MARKER: &str = "END";

/// One row of a test or keyword body.
///
/// Cells are stored verbatim, leading empty cells encode block indentation.
/// The editing model is flat: block structure appears as marker rows
/// (`FOR…END`), matching the on-disk shape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    pub cells: Vec<String>,
    pub comment: Option<String>,
}

impl Step {
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            comment: None,
        }
    }

    pub fn from_strs(cells: &[&str]) -> Self {
        Self::new(cells.iter().map(|c| c.to_string()).collect())
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// All cells plus the comment, the form occurrence matching runs over.
    pub fn as_list(&self) -> Vec<String> {
        let mut cells = self.cells.clone();
        if let Some(comment) = &self.comment {
            cells.push(comment.clone());
        }
        cells
    }

    /// Number of leading empty cells (block indentation).
    pub fn indent(&self) -> usize {
        self.cells.iter().take_while(|c| c.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(String::is_empty) && self.comment.is_none()
    }

    /// First non-empty cell, the marker/keyword position.
    pub fn first_non_empty(&self) -> Option<&str> {
        self.cells
            .iter()
            .map(String::as_str)
            .find(|c| !c.is_empty())
    }

    /// Assignment target cells before the keyword (`${x} =` style).
    pub fn assignments(&self) -> Vec<&str> {
        self.cells
            .iter()
            .skip(self.indent())
            .map(String::as_str)
            .take_while(|c| is_assignment(c))
            .collect()
    }

    /// The keyword call cell, skipping indentation and assignments.
    pub fn keyword(&self) -> Option<&str> {
        self.cells
            .iter()
            .skip(self.indent())
            .map(String::as_str)
            .find(|c| !is_assignment(c))
            .filter(|c| !c.is_empty())
    }

    /// Argument cells after the keyword.
    pub fn args(&self) -> Vec<&str> {
        let skip = self.indent() + self.assignments().len() + 1;
        self.cells.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn is_indent_start(&self) -> bool {
        self.first_non_empty().is_some_and(|c| {
            INDENT_STARTERS.contains(&c) || INDENT_CONTINUATIONS.contains(&c)
        })
    }

    pub fn is_end(&self) -> bool {
        self.first_non_empty() == Some(END_MARKER)
    }

    pub fn is_commented(&self) -> bool {
        self.first_non_empty().is_some_and(|c| c.starts_with('#'))
    }

    /// Replace the cell at `col`, growing the row with empty cells first.
    pub fn change_cell(&mut self, col: usize, value: String) {
        while self.cells.len() <= col {
            self.cells.push(String::new());
        }
        self.cells[col] = value;
    }

    /// Insert at `col`, shifting the rest of the row right.
    pub fn insert_cell(&mut self, col: usize, value: String) {
        while self.cells.len() < col {
            self.cells.push(String::new());
        }
        self.cells.insert(col, value);
    }

    /// Remove the cell at `col` when present; returns the removed value.
    pub fn delete_cell(&mut self, col: usize) -> Option<String> {
        if col < self.cells.len() {
            Some(self.cells.remove(col))
        } else {
            None
        }
    }

    /// Remove one leading empty cell, when there is one.
    pub fn dedent(&mut self) -> bool {
        if self.cells.first().is_some_and(String::is_empty) {
            self.cells.remove(0);
            true
        } else {
            false
        }
    }

    /// Add one leading empty cell.
    pub fn add_indent(&mut self) {
        self.cells.insert(0, String::new());
    }

    /// Drop trailing empty cells; a row that ends with exactly one empty
    /// trailing cell and carries no comment collapses it to `${EMPTY}`.
    pub fn collapse_trailing_empty(&mut self) {
        let trailing = self
            .cells
            .iter()
            .rev()
            .take_while(|c| c.is_empty())
            .count();
        if trailing == 0 {
            return;
        }
        if trailing == 1 && self.comment.is_none() && self.cells.len() > 1 {
            let last = self.cells.len() - 1;
            self.cells[last] = "${EMPTY}".to_string();
        } else {
            self.cells.truncate(self.cells.len() - trailing);
        }
    }
}

fn is_assignment(cell: &str) -> bool {
    let trimmed = cell.trim_end();
    let stripped = trimmed.strip_suffix('=').map_or(trimmed, str::trim_end);
    !stripped.is_empty() && is_variable(stripped)
}

/// Parser handoff form of a block: header row plus nested body.
///
/// The editing model flattens these to marker rows; `flatten` produces the
/// flat shape with one level of indentation added to the body and a closing
/// `END` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStep {
    pub header: Step,
    pub body: Vec<Step>,
}

impl BlockStep {
    pub fn flatten(self) -> Vec<Step> {
        let mut rows = Vec::with_capacity(self.body.len() + 2);
        rows.push(self.header);
        for mut step in self.body {
            step.add_indent();
            rows.push(step);
        }
        rows.push(Step::from_strs(&[END_MARKER]));
        rows
    }
}
