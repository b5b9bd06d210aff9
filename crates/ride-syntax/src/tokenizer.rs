//! Stateful row tokeniser.
//!
//! Rows are classified through a small table automaton: the current table
//! (`settings`/`variables`/`tests`/`keywords`), whether a template is
//! active, and whether the row continues the previous one with `...`. The
//! automaton is stateful *across* rows but each row is tokenised in one
//! pass, producing `(offset, kind, text)` triples whose texts concatenate
//! back to the original row.

use crate::language::{LanguagePack, TableHeader};
use crate::row::{RowCell, RowCellKind, split_row};
use crate::lexer::{VarTokenKind, lex};
use crate::syntax_kind::TokenKind;
use crate::variables::find_variables;

/// One coloured span of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub offset: usize,
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    fn new(offset: usize, kind: TokenKind, text: &'a str) -> Self {
        Self { offset, kind, text }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Unknown,
    Settings,
    Variables,
    TestCases,
    Keywords,
    Comments,
}

/// Block and loop markers rendered as structural syntax.
const SYNTAX_MARKERS: &[&str] = &[
    "FOR", "END", "IF", "ELSE", "ELSE IF", "WHILE", "TRY", "EXCEPT", "FINALLY", "GROUP", "RETURN",
    "BREAK", "CONTINUE",
];

const FOR_SEPARATORS: &[&str] = &["IN", "IN RANGE", "IN ENUMERATE", "IN ZIP"];

const IMPORT_SETTINGS: &[&str] = &["library", "resource", "variables"];

const KNOWN_SETTINGS: &[&str] = &[
    "documentation",
    "metadata",
    "suite setup",
    "suite teardown",
    "test setup",
    "test teardown",
    "test template",
    "test timeout",
    "test tags",
    "task setup",
    "task teardown",
    "task template",
    "task timeout",
    "task tags",
    "force tags",
    "default tags",
    "keyword tags",
];

/// Settings whose first value cell names a keyword.
const KEYWORD_VALUED_SETTINGS: &[&str] = &[
    "suite setup",
    "suite teardown",
    "test setup",
    "test teardown",
    "test template",
    "task setup",
    "task teardown",
    "task template",
    "[setup]",
    "[teardown]",
    "[template]",
];

const BRACKET_SETTINGS: &[&str] = &[
    "[documentation]",
    "[tags]",
    "[setup]",
    "[teardown]",
    "[template]",
    "[timeout]",
    "[arguments]",
    "[return]",
];

/// Row tokeniser; one instance tokenises a file top to bottom.
pub struct Tokenizer {
    language: LanguagePack,
    table: Table,
    /// `Test Template` in the settings table.
    default_template: bool,
    /// `[Template]` override of the current test, reset on a new name row.
    test_template: Option<bool>,
}

impl Tokenizer {
    pub fn new(language: LanguagePack) -> Self {
        Self {
            language,
            table: Table::Unknown,
            default_template: false,
            test_template: None,
        }
    }

    fn template_active(&self) -> bool {
        self.test_template.unwrap_or(self.default_template)
    }

    /// Tokenise one row, updating the automaton state.
    pub fn tokenize_row<'a>(&mut self, row: &'a str) -> Vec<Token<'a>> {
        let parts = split_row(row);
        let cells: Vec<&RowCell<'a>> = parts.iter().filter(|p| p.is_cell()).collect();

        let first_content = cells.iter().position(|c| !c.text.is_empty());
        let mut out = Vec::with_capacity(parts.len());

        // Header rows switch the table before anything else is classified.
        let is_header = matches!(first_content, Some(0)) && cells[0].text.starts_with('*');
        if is_header {
            self.enter_table(cells[0].text);
        }

        let mut cell_index = 0;
        let mut comment_from: Option<usize> = None;
        let mut row_ctx = RowContext::new(self, &cells, first_content);

        for part in &parts {
            match part.kind {
                RowCellKind::Separator | RowCellKind::Newline => {
                    out.push(Token::new(part.offset, TokenKind::Separator, part.text));
                }
                RowCellKind::Cell => {
                    if comment_from.is_none() && part.text.starts_with('#') {
                        comment_from = Some(cell_index);
                    }
                    if part.text.is_empty() {
                        // Zero-length cells carry no bytes and no colour.
                    } else if comment_from.is_some() {
                        out.push(Token::new(part.offset, TokenKind::Comment, part.text));
                    } else if is_header {
                        out.push(Token::new(part.offset, TokenKind::Heading, part.text));
                    } else {
                        row_ctx.emit_cell(&mut out, part, cell_index, &self.language);
                    }
                    cell_index += 1;
                }
            }
        }

        row_ctx.commit(self);
        out
    }

    fn enter_table(&mut self, header_cell: &str) {
        self.table = match self.language.table_for_header(header_cell) {
            Some(TableHeader::Settings) => Table::Settings,
            Some(TableHeader::Variables) => Table::Variables,
            Some(TableHeader::TestCases) => Table::TestCases,
            Some(TableHeader::Keywords) => Table::Keywords,
            Some(TableHeader::Comments) => Table::Comments,
            None => Table::Unknown,
        };
        self.default_template = false;
        self.test_template = None;
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(LanguagePack::english())
    }
}

/// Per-row classification context, computed once and consumed cell by cell.
struct RowContext {
    table: Table,
    template_active: bool,
    /// Index (among cells) of the first non-empty cell.
    first_content: Option<usize>,
    /// The row continues the previous one with `...`.
    continuation: bool,
    /// A column-zero name row in a tests/keywords table.
    name_row: bool,
    /// Lowercased first content cell.
    leader: String,
    /// Position within the step: how many content cells emitted so far.
    content_seen: usize,
    /// Keyword cell for this row already emitted.
    keyword_done: bool,
    /// State updates applied at end of row.
    saw_default_template: Option<bool>,
    saw_test_template: Option<bool>,
    reset_test_template: bool,
}

impl RowContext {
    fn new(tok: &Tokenizer, cells: &[&RowCell<'_>], first_content: Option<usize>) -> Self {
        let leader = first_content
            .map(|i| cells[i].text.to_lowercase())
            .unwrap_or_default();
        let continuation = leader == "...";
        let name_row = matches!(tok.table, Table::TestCases | Table::Keywords)
            && matches!(first_content, Some(0));

        let mut ctx = Self {
            table: tok.table,
            template_active: tok.template_active(),
            first_content,
            continuation,
            name_row,
            leader,
            content_seen: 0,
            keyword_done: false,
            saw_default_template: None,
            saw_test_template: None,
            reset_test_template: false,
        };

        if name_row && tok.table == Table::TestCases {
            ctx.reset_test_template = true;
            // The override of the previous test must not leak into this row.
            ctx.template_active = tok.default_template;
        }

        // Template settings are recognised up front so the automaton state
        // is correct for the *next* row.
        if tok.table == Table::Settings
            && (ctx.leader == "test template" || ctx.leader == "task template")
        {
            ctx.saw_default_template = Some(template_value_enables(cells, first_content));
        }
        if matches!(tok.table, Table::TestCases) && ctx.leader == "[template]" {
            ctx.saw_test_template = Some(template_value_enables(cells, first_content));
        }

        ctx
    }

    fn commit(self, tok: &mut Tokenizer) {
        if self.reset_test_template {
            tok.test_template = None;
        }
        if let Some(enabled) = self.saw_default_template {
            tok.default_template = enabled;
        }
        if let Some(enabled) = self.saw_test_template {
            tok.test_template = Some(enabled);
        }
    }

    fn emit_cell<'a>(
        &mut self,
        out: &mut Vec<Token<'a>>,
        cell: &RowCell<'a>,
        cell_index: usize,
        language: &LanguagePack,
    ) {
        self.content_seen += 1;
        let is_first = self.first_content == Some(cell_index);

        if self.continuation {
            if is_first {
                out.push(Token::new(cell.offset, TokenKind::Syntax, cell.text));
            } else {
                emit_value(out, cell, TokenKind::Argument);
            }
            return;
        }

        match self.table {
            Table::Unknown | Table::Comments => {
                out.push(Token::new(cell.offset, TokenKind::Comment, cell.text));
            }
            Table::Settings => self.emit_settings_cell(out, cell, is_first),
            Table::Variables => {
                if is_first {
                    let kind = if crate::variables::is_variable(trim_assign(cell.text)) {
                        TokenKind::Variable
                    } else {
                        TokenKind::Error
                    };
                    out.push(Token::new(cell.offset, kind, cell.text));
                } else {
                    emit_value(out, cell, TokenKind::Argument);
                }
            }
            Table::TestCases | Table::Keywords => {
                if self.name_row && cell_index == 0 {
                    out.push(Token::new(cell.offset, TokenKind::TcKwName, cell.text));
                } else {
                    self.emit_step_cell(out, cell, language);
                }
            }
        }
    }

    fn emit_settings_cell<'a>(
        &mut self,
        out: &mut Vec<Token<'a>>,
        cell: &RowCell<'a>,
        is_first: bool,
    ) {
        if is_first {
            let name = self.leader.as_str();
            let kind = if IMPORT_SETTINGS.contains(&name) {
                TokenKind::Import
            } else if KNOWN_SETTINGS.contains(&name) {
                TokenKind::Setting
            } else {
                TokenKind::Error
            };
            out.push(Token::new(cell.offset, kind, cell.text));
        } else if self.content_seen == 2 && KEYWORD_VALUED_SETTINGS.contains(&self.leader.as_str())
        {
            emit_value(out, cell, TokenKind::Keyword);
        } else {
            emit_value(out, cell, TokenKind::Argument);
        }
    }

    fn emit_step_cell<'a>(
        &mut self,
        out: &mut Vec<Token<'a>>,
        cell: &RowCell<'a>,
        language: &LanguagePack,
    ) {
        let marker = cell.text.trim();
        if !self.keyword_done {
            // Bracketed per-item settings.
            if BRACKET_SETTINGS.contains(&self.leader.as_str()) {
                let kind = if self.leader == cell.text.to_lowercase() {
                    TokenKind::Setting
                } else if self.content_seen == 2
                    && KEYWORD_VALUED_SETTINGS.contains(&self.leader.as_str())
                {
                    TokenKind::Keyword
                } else {
                    TokenKind::Argument
                };
                if kind == TokenKind::Setting {
                    out.push(Token::new(cell.offset, kind, cell.text));
                } else {
                    emit_value(out, cell, kind);
                }
                return;
            }
            // Block markers.
            if SYNTAX_MARKERS.contains(&marker) {
                out.push(Token::new(cell.offset, TokenKind::Syntax, cell.text));
                self.keyword_done = true;
                return;
            }
            // Assignment targets before the keyword cell.
            if is_assignment(cell.text) {
                emit_assignment(out, cell);
                return;
            }
            self.keyword_done = true;
            if self.template_active {
                emit_value(out, cell, TokenKind::Argument);
                return;
            }
            if self.table == Table::TestCases
                && let Some((prefix, rest)) = language.strip_bdd_prefix(cell.text)
            {
                out.push(Token::new(cell.offset, TokenKind::Gherkin, prefix));
                emit_value(
                    out,
                    &RowCell {
                        offset: cell.offset + prefix.len(),
                        text: rest,
                        kind: RowCellKind::Cell,
                    },
                    TokenKind::Keyword,
                );
                return;
            }
            emit_value(out, cell, TokenKind::Keyword);
            return;
        }
        // Cells after the keyword: loop separators read as syntax.
        if FOR_SEPARATORS.contains(&marker) {
            out.push(Token::new(cell.offset, TokenKind::Syntax, cell.text));
        } else {
            emit_value(out, cell, TokenKind::Argument);
        }
    }
}

fn template_value_enables(cells: &[&RowCell<'_>], first_content: Option<usize>) -> bool {
    let Some(first) = first_content else {
        return false;
    };
    cells
        .iter()
        .skip(first + 1)
        .find(|c| !c.text.is_empty())
        .map(|c| !c.text.eq_ignore_ascii_case("NONE"))
        .unwrap_or(false)
}

fn trim_assign(text: &str) -> &str {
    let trimmed = text.trim_end();
    trimmed.strip_suffix('=').map_or(trimmed, str::trim_end)
}

fn is_assignment(text: &str) -> bool {
    crate::variables::is_variable(trim_assign(text))
}

fn emit_assignment<'a>(out: &mut Vec<Token<'a>>, cell: &RowCell<'a>) {
    let stripped = trim_assign(cell.text);
    emit_value(
        out,
        &RowCell {
            offset: cell.offset,
            text: stripped,
            kind: RowCellKind::Cell,
        },
        TokenKind::Variable,
    );
    if stripped.len() < cell.text.len() {
        out.push(Token::new(
            cell.offset + stripped.len(),
            TokenKind::Syntax,
            &cell.text[stripped.len()..],
        ));
    }
}

/// Emit one cell, splitting out variable spans.
///
/// The base kind covers text between variables; each variable span becomes
/// `Variable`, with a trailing index on list/dict forms split as
/// syntax + variable + syntax. A cell with an unclosed variable start is an
/// error in its entirety.
fn emit_value<'a>(out: &mut Vec<Token<'a>>, cell: &RowCell<'a>, kind: TokenKind) {
    let text = cell.text;
    let matches = find_variables(text);

    if has_malformed_variable(text, &matches) {
        out.push(Token::new(cell.offset, TokenKind::Error, text));
        return;
    }
    if matches.is_empty() {
        out.push(Token::new(cell.offset, kind, text));
        return;
    }

    let mut pos = 0;
    for m in &matches {
        if m.start > pos {
            out.push(Token::new(cell.offset + pos, kind, &text[pos..m.start]));
        }
        let body_end = m.base_end + 1;
        out.push(Token::new(
            cell.offset + m.start,
            TokenKind::Variable,
            &text[m.start..body_end],
        ));
        if let Some((idx_start, idx_end)) = m.index {
            debug_assert!(m.kind.supports_index());
            out.push(Token::new(
                cell.offset + body_end,
                TokenKind::Syntax,
                &text[body_end..idx_start],
            ));
            out.push(Token::new(
                cell.offset + idx_start,
                TokenKind::Variable,
                &text[idx_start..idx_end],
            ));
            out.push(Token::new(
                cell.offset + idx_end,
                TokenKind::Syntax,
                &text[idx_end..m.end],
            ));
        }
        pos = m.end;
    }
    if pos < text.len() {
        out.push(Token::new(cell.offset + pos, kind, &text[pos..]));
    }
}

/// A live variable start outside every matched span means the cell's
/// variable grammar is malformed.
fn has_malformed_variable(text: &str, matches: &[crate::variables::VariableMatch]) -> bool {
    for token in lex(text) {
        let is_start = matches!(
            token.kind,
            VarTokenKind::ScalarStart
                | VarTokenKind::ListStart
                | VarTokenKind::DictStart
                | VarTokenKind::EnvStart
        );
        if is_start
            && !matches
                .iter()
                .any(|m| token.start >= m.start && token.end <= m.end)
        {
            return true;
        }
    }
    false
}

/// Convenience: tokenise a full source text row by row.
pub fn tokenize(source: &str, language: LanguagePack) -> Vec<Vec<Token<'_>>> {
    let mut tokenizer = Tokenizer::new(language);
    split_lines(source)
        .map(|line| tokenizer.tokenize_row(line))
        .collect()
}

/// Split keeping the line terminator with each row.
fn split_lines(source: &str) -> impl Iterator<Item = &str> {
    let mut rest = source;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let (line, tail) = rest.split_at(end);
        rest = tail;
        Some(line)
    })
}
