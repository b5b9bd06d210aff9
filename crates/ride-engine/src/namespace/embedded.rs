//! Embedded-argument keyword names (`Select ${animal} From List`).

use regex::Regex;
use ride_syntax::variables::find_variables;

/// Compiled matcher for a keyword name with `${…}` placeholders.
///
/// The name compiles to an anchored case-insensitive regex with one lazy
/// capture per placeholder; a call matches only when the capture count
/// equals the placeholder count.
#[derive(Debug, Clone)]
pub struct EmbeddedArgsMatcher {
    regex: Regex,
    placeholders: usize,
}

impl EmbeddedArgsMatcher {
    /// `None` when the name has no embedded arguments.
    pub fn new(name: &str) -> Option<Self> {
        let spans = find_variables(name);
        if spans.is_empty() {
            return None;
        }
        let mut pattern = String::from("(?i)^");
        let mut pos = 0;
        for span in &spans {
            pattern.push_str(&regex::escape(&name[pos..span.start]));
            pattern.push_str("(.*?)");
            pos = span.end;
        }
        pattern.push_str(&regex::escape(&name[pos..]));
        pattern.push('$');
        let regex = Regex::new(&pattern).ok()?;
        Some(Self {
            regex,
            placeholders: spans.len(),
        })
    }

    pub fn matches(&self, call: &str) -> bool {
        self.regex
            .captures(call)
            .is_some_and(|caps| caps.len() - 1 == self.placeholders)
    }

    /// The argument values a matching call binds, in placeholder order.
    pub fn extract_args<'a>(&self, call: &'a str) -> Option<Vec<&'a str>> {
        let caps = self.regex.captures(call)?;
        if caps.len() - 1 != self.placeholders {
            return None;
        }
        Some(
            (1..caps.len())
                .filter_map(|i| caps.get(i).map(|m| m.as_str()))
                .collect(),
        )
    }
}
