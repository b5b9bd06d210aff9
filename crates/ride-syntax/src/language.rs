//! Language packs: BDD prefixes and localised table headers.
//!
//! The tokeniser and the keyword resolver are language-dependent only
//! through this record; the default pack is English.

use std::collections::HashMap;

/// Canonical table names, independent of localisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableHeader {
    Settings,
    Variables,
    TestCases,
    Keywords,
    Comments,
}

/// A language configuration record.
#[derive(Debug, Clone)]
pub struct LanguagePack {
    pub code: String,
    /// BDD step prefixes, matched case-insensitively.
    pub bdd_prefixes: Vec<String>,
    /// Localised header spellings mapped to their canonical table.
    pub headers: HashMap<String, TableHeader>,
}

impl LanguagePack {
    pub fn english() -> Self {
        let mut headers = HashMap::new();
        for (names, table) in [
            (&["Settings", "Setting"][..], TableHeader::Settings),
            (&["Variables", "Variable"][..], TableHeader::Variables),
            (
                &["Test Cases", "Test Case", "Tasks", "Task"][..],
                TableHeader::TestCases,
            ),
            (&["Keywords", "Keyword"][..], TableHeader::Keywords),
            (&["Comments", "Comment"][..], TableHeader::Comments),
        ] {
            for name in names {
                headers.insert(name.to_lowercase(), table);
            }
        }
        Self {
            code: "en".to_string(),
            bdd_prefixes: ["Given", "When", "Then", "And", "But"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            headers,
        }
    }

    /// Split a leading BDD token plus single space off a call cell.
    ///
    /// Returns `(prefix_with_space, remainder)`. The prefix is matched
    /// case-insensitively and the remainder must be non-empty.
    pub fn strip_bdd_prefix<'a>(&self, cell: &'a str) -> Option<(&'a str, &'a str)> {
        let space = cell.find(' ')?;
        let (head, rest) = cell.split_at(space + 1);
        if rest.is_empty() {
            return None;
        }
        let token = head.trim_end();
        if self
            .bdd_prefixes
            .iter()
            .any(|p| p.eq_ignore_ascii_case(token))
        {
            Some((head, rest))
        } else {
            None
        }
    }

    /// Canonical table for a header cell like `*** Test Cases ***`.
    pub fn table_for_header(&self, cell: &str) -> Option<TableHeader> {
        let name = cell.trim().trim_matches('*').trim();
        self.headers.get(&name.to_lowercase()).copied()
    }
}

impl Default for LanguagePack {
    fn default() -> Self {
        Self::english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bdd_prefix_case_insensitively() {
        let pack = LanguagePack::english();
        assert_eq!(
            pack.strip_bdd_prefix("Given login page is open"),
            Some(("Given ", "login page is open"))
        );
        assert_eq!(
            pack.strip_bdd_prefix("when Login user Alice"),
            Some(("when ", "Login user Alice"))
        );
    }

    #[test]
    fn non_prefix_word_is_not_stripped() {
        let pack = LanguagePack::english();
        assert_eq!(pack.strip_bdd_prefix("Whenever it runs"), None);
        assert_eq!(pack.strip_bdd_prefix("Log"), None);
    }

    #[test]
    fn bare_prefix_is_not_stripped() {
        let pack = LanguagePack::english();
        assert_eq!(pack.strip_bdd_prefix("Given "), None);
        assert_eq!(pack.strip_bdd_prefix("Given"), None);
    }

    #[test]
    fn header_recognition_tolerates_stars_and_case() {
        let pack = LanguagePack::english();
        assert_eq!(
            pack.table_for_header("*** Test Cases ***"),
            Some(TableHeader::TestCases)
        );
        assert_eq!(
            pack.table_for_header("***settings***"),
            Some(TableHeader::Settings)
        );
        assert_eq!(pack.table_for_header("*** Unknown ***"), None);
    }
}
