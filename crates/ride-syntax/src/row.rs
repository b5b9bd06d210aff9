//! Row splitter for the two tabular source formats.
//!
//! A row is split either by runs of two or more spaces (a tab always
//! separates) or by pipes when the row opens with `| `. The splitter emits
//! alternating cell and separator values plus a terminating newline token,
//! and never drops a byte: concatenating the emitted texts reproduces the
//! row exactly.

/// Classification of one emitted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCellKind {
    Cell,
    Separator,
    Newline,
}

/// One fragment of a split row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCell<'a> {
    pub offset: usize,
    pub text: &'a str,
    pub kind: RowCellKind,
}

impl<'a> RowCell<'a> {
    fn new(offset: usize, text: &'a str, kind: RowCellKind) -> Self {
        Self { offset, text, kind }
    }

    pub fn is_cell(&self) -> bool {
        self.kind == RowCellKind::Cell
    }
}

/// Split a single source row into cells and separators.
pub fn split_row(row: &str) -> Vec<RowCell<'_>> {
    let (body, newline) = strip_newline(row);
    let mut cells = if is_pipe_row(body) {
        split_pipe_row(body)
    } else {
        split_space_row(body)
    };
    if !newline.is_empty() {
        cells.push(RowCell::new(body.len(), newline, RowCellKind::Newline));
    }
    cells
}

/// Cell texts only, separators and newline dropped.
pub fn row_cells(row: &str) -> Vec<&str> {
    split_row(row)
        .into_iter()
        .filter(RowCell::is_cell)
        .map(|c| c.text)
        .collect()
}

fn strip_newline(row: &str) -> (&str, &str) {
    if let Some(body) = row.strip_suffix("\r\n") {
        (body, &row[body.len()..])
    } else if let Some(body) = row.strip_suffix('\n') {
        (body, &row[body.len()..])
    } else {
        (row, "")
    }
}

fn is_pipe_row(body: &str) -> bool {
    body == "|" || body.starts_with("| ") || body.starts_with("|\t")
}

fn is_sep_char(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn split_pipe_row(body: &str) -> Vec<RowCell<'_>> {
    let mut out = Vec::new();

    // Leading separator: the pipe plus following whitespace, stopping where
    // a mid-row separator could start so `|  | x |` keeps its empty cell.
    let mut pos = 1;
    while pos < body.len() && body[pos..].starts_with(is_sep_char) {
        if pipe_separator_end(body, pos).is_some() {
            break;
        }
        pos += 1;
    }
    out.push(RowCell::new(0, &body[..pos], RowCellKind::Separator));

    let mut cell_start = pos;
    let mut i = pos;
    while i < body.len() {
        if let Some(sep_end) = pipe_separator_end(body, i) {
            out.push(RowCell::new(
                cell_start,
                &body[cell_start..i],
                RowCellKind::Cell,
            ));
            out.push(RowCell::new(i, &body[i..sep_end], RowCellKind::Separator));
            cell_start = sep_end;
            i = sep_end;
        } else {
            i += next_char_len(body, i);
        }
    }
    if cell_start < body.len() {
        out.push(RowCell::new(
            cell_start,
            &body[cell_start..],
            RowCellKind::Cell,
        ));
    }
    out
}

/// A pipe separator starting at `i`: whitespace, `|`, then whitespace or the
/// end of the row. Returns the offset past the separator.
fn pipe_separator_end(body: &str, i: usize) -> Option<usize> {
    if !body[i..].starts_with(is_sep_char) {
        return None;
    }
    let mut j = i;
    while j < body.len() && body[j..].starts_with(is_sep_char) {
        j += 1;
    }
    if j >= body.len() || !body[j..].starts_with('|') {
        return None;
    }
    j += 1;
    if j == body.len() {
        return Some(j);
    }
    if !body[j..].starts_with(is_sep_char) {
        return None;
    }
    while j < body.len() && body[j..].starts_with(is_sep_char) {
        // Trailing whitespace after the pipe belongs to the separator,
        // except the last run before the next pipe which opens a new cell.
        if pipe_separator_end(body, j).is_some() {
            break;
        }
        j += 1;
    }
    Some(j)
}

fn split_space_row(body: &str) -> Vec<RowCell<'_>> {
    let mut out = Vec::new();
    let mut cell_start = 0;
    let mut i = 0;
    while i < body.len() {
        if body[i..].starts_with(is_sep_char) {
            let mut j = i;
            let mut has_tab = false;
            while j < body.len() && body[j..].starts_with(is_sep_char) {
                has_tab |= body[j..].starts_with('\t');
                j += 1;
            }
            // A single space stays inside the cell; two spaces or any tab
            // separate, as does trailing whitespace.
            if j - i >= 2 || has_tab || j == body.len() {
                if cell_start < i || cell_start == 0 {
                    out.push(RowCell::new(
                        cell_start,
                        &body[cell_start..i],
                        RowCellKind::Cell,
                    ));
                }
                out.push(RowCell::new(i, &body[i..j], RowCellKind::Separator));
                cell_start = j;
            }
            i = j;
        } else {
            i += next_char_len(body, i);
        }
    }
    if cell_start < body.len() {
        out.push(RowCell::new(
            cell_start,
            &body[cell_start..],
            RowCellKind::Cell,
        ));
    }
    out
}

fn next_char_len(body: &str, i: usize) -> usize {
    body[i..].chars().next().map_or(1, char::len_utf8)
}
