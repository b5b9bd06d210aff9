/// Token kinds emitted for syntax colouring.
///
/// This is a closed set: the colouring collaborator maps each kind to a
/// style and must not meet anything outside it. `Error` marks a cell whose
/// variable sub-grammar is malformed; tokenising continues on later rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A `*** Table ***` header cell.
    Heading,
    /// A setting label (`Documentation`, `[Arguments]`, `Suite Setup`, …).
    Setting,
    /// An import setting label (`Library`, `Resource`, `Variables`).
    Import,
    /// A test case or user keyword name in column zero.
    TcKwName,
    /// A keyword call cell.
    Keyword,
    /// A plain argument cell.
    Argument,
    /// A variable span (`${…}`, `@{…}`, `&{…}`, `%{…}`).
    Variable,
    /// A `#`-comment span running to the end of the row.
    Comment,
    /// Whitespace or pipe separator between cells, and the row terminator.
    Separator,
    /// Structural syntax: block markers (`FOR`, `END`, …), continuation
    /// `...`, assignment `=` and variable index brackets.
    Syntax,
    /// A BDD prefix (`Given `, `When `, …) on the first keyword cell.
    Gherkin,
    /// A cell that could not be tokenised.
    Error,
}

impl TokenKind {
    /// True for kinds that colour an entire cell rather than a sub-span.
    pub fn is_cell_kind(self) -> bool {
        !matches!(
            self,
            TokenKind::Separator | TokenKind::Variable | TokenKind::Gherkin | TokenKind::Syntax
        )
    }
}
