//! Logos lexer for the in-cell variable sub-grammar.
//!
//! Cells are lexed into a flat token stream that the variable matcher walks
//! to find `${…}`-style spans. Every byte of the input appears in exactly
//! one token, so concatenating token texts reproduces the cell:
//!
//! ```
//! use ride_syntax::lexer::lex;
//!
//! let input = r"prefix ${var}[0] \${escaped}";
//! let tokens = lex(input);
//! let reconstructed: String = tokens.iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```

use logos::Logos;

/// Token kinds of the variable sub-grammar.
///
/// The lexer is context-free on purpose: it does not know whether a `}`
/// closes a variable or is plain text. Matching starts to closes (and escape
/// cascades) is the matcher's job in [`crate::variables`].
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarTokenKind {
    /// `\` followed by any character; escapes cascade, so `\\` consumes both
    /// backslashes and leaves a following `${` live.
    #[regex(r"\\.")]
    Escape,

    /// `${` opening a scalar variable.
    #[token("${")]
    ScalarStart,

    /// `@{` opening a list variable.
    #[token("@{")]
    ListStart,

    /// `&{` opening a dict variable.
    #[token("&{")]
    DictStart,

    /// `%{` opening an environment variable.
    #[token("%{")]
    EnvStart,

    /// A bare `{` inside a variable base.
    #[token("{")]
    OpenBrace,

    /// `}` closing a variable (or plain text outside one).
    #[token("}")]
    CloseBrace,

    /// `[` opening a trailing list/dict index.
    #[token("[")]
    OpenBracket,

    /// `]` closing a trailing index.
    #[token("]")]
    CloseBracket,

    /// Anything else, grouped into runs.
    #[regex(r"[^\\${}@&%\[\]]+")]
    Text,

    /// Lone sigil characters not followed by `{`.
    #[regex(r"[$@&%]")]
    Sigil,
}

/// A lexed token with its kind, text slice and byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarToken<'a> {
    pub kind: VarTokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Lex a cell into variable sub-grammar tokens.
///
/// Guarantees that all bytes of the input appear in the output tokens.
pub fn lex(input: &str) -> Vec<VarToken<'_>> {
    let mut tokens = Vec::new();
    let mut lexer = VarTokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let kind = match result {
            Ok(kind) => kind,
            // Unrecognised bytes degrade to text so the stream stays lossless.
            Err(()) => VarTokenKind::Text,
        };
        tokens.push(VarToken {
            kind,
            text: lexer.slice(),
            start: span.start,
            end: span.end,
        });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<VarTokenKind> {
        lex(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_empty_input() {
        assert_eq!(lex(""), vec![]);
    }

    #[test]
    fn lex_plain_text() {
        let tokens = lex("hello world");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, VarTokenKind::Text);
        assert_eq!(tokens[0].text, "hello world");
    }

    #[test]
    fn lex_scalar_variable() {
        assert_eq!(
            kinds("${name}"),
            vec![
                VarTokenKind::ScalarStart,
                VarTokenKind::Text,
                VarTokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn lex_all_sigils() {
        assert_eq!(kinds("@{l}")[0], VarTokenKind::ListStart);
        assert_eq!(kinds("&{d}")[0], VarTokenKind::DictStart);
        assert_eq!(kinds("%{e}")[0], VarTokenKind::EnvStart);
    }

    #[test]
    fn lex_escape_consumes_two_bytes() {
        let tokens = lex(r"\${x}");
        assert_eq!(tokens[0].kind, VarTokenKind::Escape);
        assert_eq!(tokens[0].text, r"\$");
        // The `{` after an escaped sigil is a bare brace, not a start.
        assert_eq!(tokens[1].kind, VarTokenKind::OpenBrace);
    }

    #[test]
    fn lex_double_escape_leaves_start_live() {
        let tokens = lex(r"\\${x}");
        assert_eq!(tokens[0].kind, VarTokenKind::Escape);
        assert_eq!(tokens[0].text, r"\\");
        assert_eq!(tokens[1].kind, VarTokenKind::ScalarStart);
    }

    #[test]
    fn lex_index_brackets() {
        assert_eq!(
            kinds("@{list}[0]"),
            vec![
                VarTokenKind::ListStart,
                VarTokenKind::Text,
                VarTokenKind::CloseBrace,
                VarTokenKind::OpenBracket,
                VarTokenKind::Text,
                VarTokenKind::CloseBracket,
            ]
        );
    }

    #[test]
    fn lex_lone_sigil_is_not_a_start() {
        let tokens = lex("$100 @home");
        assert!(tokens.iter().any(|t| t.kind == VarTokenKind::Sigil));
        assert!(tokens.iter().all(|t| t.kind != VarTokenKind::ScalarStart));
    }

    #[test]
    fn all_bytes_preserved() {
        let input = r"a ${x${inner}}[1] \${esc} %{ENV} trailing";
        let tokens = lex(input);
        let reconstructed: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(input, reconstructed);
    }

    #[test]
    fn spans_are_correct() {
        let input = "pre ${var} post";
        for token in lex(input) {
            assert_eq!(token.text, &input[token.start..token.end]);
        }
    }
}
