//! Variable matcher: recognises `${scalar}`, `@{list}`, `&{dict}` and
//! `%{environment}` forms inside cell text.
//!
//! Matching runs over the token stream produced by [`crate::lexer`], so the
//! escape rules live in exactly one place: `\${x}` never opens a variable,
//! `\\${x}` does (escapes cascade in the lexer). Spans are outermost and
//! balanced: the body may contain nested variables and bare braces.

use crate::lexer::{VarToken, VarTokenKind, lex};

/// The sigil of a matched variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Scalar,
    List,
    Dict,
    Environment,
}

impl VariableKind {
    fn from_start(kind: VarTokenKind) -> Option<Self> {
        match kind {
            VarTokenKind::ScalarStart => Some(VariableKind::Scalar),
            VarTokenKind::ListStart => Some(VariableKind::List),
            VarTokenKind::DictStart => Some(VariableKind::Dict),
            VarTokenKind::EnvStart => Some(VariableKind::Environment),
            _ => None,
        }
    }

    /// Whether a trailing `[index]` is meaningful for this kind.
    pub fn supports_index(self) -> bool {
        matches!(self, VariableKind::List | VariableKind::Dict)
    }
}

/// One matched variable span inside a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMatch {
    pub kind: VariableKind,
    /// Byte offset of the sigil.
    pub start: usize,
    /// Byte offset past the closing brace, or past the index bracket when
    /// one is attached.
    pub end: usize,
    /// Range of the base text between the braces.
    pub base_start: usize,
    pub base_end: usize,
    /// Content range of a trailing `[…]` index, list/dict forms only.
    pub index: Option<(usize, usize)>,
}

impl VariableMatch {
    /// The base text between the braces, e.g. `name` for `${name}`.
    pub fn base<'a>(&self, text: &'a str) -> &'a str {
        &text[self.base_start..self.base_end]
    }

    /// The index text between the brackets, e.g. `0` for `@{x}[0]`.
    pub fn index_text<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.index.map(|(s, e)| &text[s..e])
    }

    /// The full matched span, sigil to final brace or bracket.
    pub fn as_str<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// Offset past the closing brace, ignoring any index.
    fn body_end(&self) -> usize {
        // base_end points at the closing brace.
        self.base_end + 1
    }
}

/// Find the first variable span in `text`.
///
/// Starts are tried left to right; a start whose brace never balances is
/// skipped, so `${a ${b}` matches `${b}`. Returns `None` when no balanced
/// span exists (the tokeniser maps such cells to `Error`).
pub fn search_variable(text: &str) -> Option<VariableMatch> {
    let tokens = lex(text);
    search_in_tokens(text, &tokens, 0)
}

/// Find all non-overlapping outermost variable spans, left to right.
pub fn find_variables(text: &str) -> Vec<VariableMatch> {
    let tokens = lex(text);
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(m) = search_in_tokens(text, &tokens, from) {
        from = m.end;
        found.push(m);
    }
    found
}

fn search_in_tokens(text: &str, tokens: &[VarToken<'_>], from: usize) -> Option<VariableMatch> {
    for (i, token) in tokens.iter().enumerate() {
        if token.start < from {
            continue;
        }
        let Some(kind) = VariableKind::from_start(token.kind) else {
            continue;
        };
        if let Some(close) = find_balanced_close(&tokens[i..]) {
            let close_token = &tokens[i + close];
            let mut m = VariableMatch {
                kind,
                start: token.start,
                end: close_token.end,
                base_start: token.end,
                base_end: close_token.start,
                index: None,
            };
            if kind.supports_index()
                && let Some((content, past)) = trailing_index(&tokens[i + close + 1..])
            {
                m.index = Some(content);
                m.end = past;
            }
            debug_assert!(m.as_str(text).len() >= 3);
            return Some(m);
        }
    }
    None
}

/// Index of the token closing the variable opened by `tokens[0]`, counting
/// nested starts and bare braces.
fn find_balanced_close(tokens: &[VarToken<'_>]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            VarTokenKind::ScalarStart
            | VarTokenKind::ListStart
            | VarTokenKind::DictStart
            | VarTokenKind::EnvStart
            | VarTokenKind::OpenBrace => depth += 1,
            VarTokenKind::CloseBrace => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// A `[…]` immediately following the close brace. Returns the content range
/// and the offset past the closing bracket.
fn trailing_index(tokens: &[VarToken<'_>]) -> Option<((usize, usize), usize)> {
    let first = tokens.first()?;
    if first.kind != VarTokenKind::OpenBracket {
        return None;
    }
    for token in &tokens[1..] {
        if token.kind == VarTokenKind::CloseBracket {
            return Some(((first.end, token.start), token.end));
        }
    }
    None
}

/// Whole-string predicate: `text` is exactly one variable (an index is
/// permitted on list/dict forms).
pub fn is_variable(text: &str) -> bool {
    matches!(search_variable(text), Some(m) if m.start == 0 && m.end == text.len())
}

/// Whole-string predicate for `${…}`.
pub fn is_scalar_variable(text: &str) -> bool {
    whole_match_kind(text) == Some(VariableKind::Scalar)
}

/// Whole-string predicate for `@{…}` with optional `[index]`.
pub fn is_list_variable(text: &str) -> bool {
    whole_match_kind(text) == Some(VariableKind::List)
}

/// Whole-string predicate for `&{…}` with optional `[index]`.
pub fn is_dict_variable(text: &str) -> bool {
    whole_match_kind(text) == Some(VariableKind::Dict)
}

/// Whole-string predicate for `%{…}`.
pub fn is_environment_variable(text: &str) -> bool {
    whole_match_kind(text) == Some(VariableKind::Environment)
}

/// True when `text` embeds at least one variable anywhere.
pub fn contains_variable(text: &str) -> bool {
    search_variable(text).is_some()
}

fn whole_match_kind(text: &str) -> Option<VariableKind> {
    search_variable(text)
        .filter(|m| m.start == 0 && m.end == text.len())
        .map(|m| m.kind)
}

/// Variable base without sigil and braces, when the whole string is one
/// variable. An index is stripped: `@{x}[0]` yields `x`.
pub fn variable_base(text: &str) -> Option<String> {
    search_variable(text)
        .filter(|m| m.start == 0 && (m.end == text.len() || m.body_end() == text.len()))
        .map(|m| m.base(text).to_string())
}
