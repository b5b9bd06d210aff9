//! Exclude patterns for directory loading.
//!
//! Patterns are shell-style globs (`*`, `?`, `[seq]`, `[!seq]`). A literal
//! path entry excludes the whole subtree below it.

use glob::{MatchOptions, Pattern};
use std::path::Path;

pub(crate) const EXCLUDES_KEY: &str = "excludes";

/// A resolved view over the exclude pattern list.
#[derive(Debug, Clone, Default)]
pub struct Excludes {
    patterns: Vec<String>,
}

impl Excludes {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `path` is excluded: either under a literal path entry or
    /// matched by a glob pattern.
    pub fn contains(&self, path: &Path) -> bool {
        let candidate = path.to_string_lossy();
        self.patterns.iter().any(|pattern| {
            literal_prefix_match(pattern, &candidate) || glob_match(pattern, &candidate)
        })
    }
}

fn literal_prefix_match(pattern: &str, candidate: &str) -> bool {
    if pattern.contains(['*', '?', '[']) {
        return false;
    }
    let pattern = pattern.trim_end_matches('/');
    candidate == pattern
        || candidate
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('\\'))
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    Pattern::new(pattern).is_ok_and(|p| p.matches_with(candidate, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excludes(patterns: &[&str]) -> Excludes {
        Excludes::new(patterns.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn literal_path_excludes_subtree() {
        let ex = excludes(&["/suites/legacy"]);
        assert!(ex.contains(Path::new("/suites/legacy")));
        assert!(ex.contains(Path::new("/suites/legacy/old.robot")));
        assert!(!ex.contains(Path::new("/suites/legacy2/old.robot")));
    }

    #[test]
    fn star_glob_matches_anywhere() {
        let ex = excludes(&["*/build/*"]);
        assert!(ex.contains(Path::new("/repo/build/generated.robot")));
        assert!(!ex.contains(Path::new("/repo/src/main.robot")));
    }

    #[test]
    fn question_mark_and_char_classes() {
        let ex = excludes(&["/data/v?", "/data/set[!x]"]);
        assert!(ex.contains(Path::new("/data/v1")));
        assert!(!ex.contains(Path::new("/data/v12")));
        assert!(ex.contains(Path::new("/data/seta")));
        assert!(!ex.contains(Path::new("/data/setx")));
    }

    #[test]
    fn empty_excludes_match_nothing() {
        let ex = Excludes::default();
        assert!(ex.is_empty());
        assert!(!ex.contains(Path::new("/anything")));
    }

    #[test]
    fn invalid_glob_is_ignored() {
        let ex = excludes(&["[unclosed"]);
        assert!(!ex.contains(Path::new("/anything")));
    }
}
