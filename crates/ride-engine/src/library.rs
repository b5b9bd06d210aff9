//! Keyword metadata and the library-manager seam.
//!
//! The engine never imports real test libraries itself. A `LibraryManager`
//! collaborator answers keyword queries; the built-in library table below
//! backs the default resolution path and the test suites.

use crate::model::normalize;

/// Where a resolved keyword comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordOrigin {
    UserKeyword,
    Resource,
    Library,
}

/// Resolved keyword metadata, as returned by namespace lookups and
/// library queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordInfo {
    pub name: String,
    /// Owning library name or resource basename.
    pub source: String,
    pub origin: KeywordOrigin,
    pub args: Vec<String>,
    pub doc: String,
}

impl KeywordInfo {
    pub fn library(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            origin: KeywordOrigin::Library,
            args: Vec::new(),
            doc: String::new(),
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        normalize(&self.name) == normalize(name)
    }
}

/// Collaborator answering keyword queries for imported libraries.
pub trait LibraryManager: Send + Sync {
    /// Keywords of the library imported as `(name, args, alias)`. An
    /// unknown library yields an empty list, not an error.
    fn keywords(
        &self,
        name: &str,
        args: &[String],
        alias: Option<&str>,
    ) -> anyhow::Result<Vec<KeywordInfo>>;

    fn start(&self) -> anyhow::Result<()>;
    fn stop(&self) -> anyhow::Result<()>;
    fn is_alive(&self) -> bool;
}

/// In-process library manager backed by a fixed table. The default
/// instance knows only the built-in library.
#[derive(Debug, Default)]
pub struct StaticLibraryManager {
    libraries: Vec<(String, Vec<KeywordInfo>)>,
}

impl StaticLibraryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(
        mut self,
        name: impl Into<String>,
        keywords: Vec<KeywordInfo>,
    ) -> Self {
        self.libraries.push((name.into(), keywords));
        self
    }
}

impl LibraryManager for StaticLibraryManager {
    fn keywords(
        &self,
        name: &str,
        _args: &[String],
        alias: Option<&str>,
    ) -> anyhow::Result<Vec<KeywordInfo>> {
        let source = alias.unwrap_or(name);
        Ok(self
            .libraries
            .iter()
            .find(|(lib, _)| lib == name)
            .map(|(_, kws)| {
                kws.iter()
                    .map(|kw| KeywordInfo {
                        source: source.to_string(),
                        ..kw.clone()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_alive(&self) -> bool {
        true
    }
}

/// Names of the always-available built-in library keywords.
pub const BUILTIN_KEYWORDS: &[&str] = &[
    "Call Method",
    "Catenate",
    "Comment",
    "Continue For Loop",
    "Continue For Loop If",
    "Convert To Binary",
    "Convert To Boolean",
    "Convert To Bytes",
    "Convert To Hex",
    "Convert To Integer",
    "Convert To Number",
    "Convert To Octal",
    "Convert To String",
    "Create Dictionary",
    "Create List",
    "Evaluate",
    "Exit For Loop",
    "Exit For Loop If",
    "Fail",
    "Fatal Error",
    "Get Count",
    "Get Length",
    "Get Library Instance",
    "Get Time",
    "Get Variable Value",
    "Get Variables",
    "Import Library",
    "Import Resource",
    "Import Variables",
    "Keyword Should Exist",
    "Length Should Be",
    "Log",
    "Log Many",
    "Log To Console",
    "Log Variables",
    "No Operation",
    "Pass Execution",
    "Pass Execution If",
    "Regexp Escape",
    "Reload Library",
    "Remove Tags",
    "Repeat Keyword",
    "Replace Variables",
    "Return From Keyword",
    "Return From Keyword If",
    "Run Keyword",
    "Run Keyword And Continue On Failure",
    "Run Keyword And Expect Error",
    "Run Keyword And Ignore Error",
    "Run Keyword And Return",
    "Run Keyword And Return If",
    "Run Keyword And Return Status",
    "Run Keyword And Warn On Failure",
    "Run Keyword If",
    "Run Keyword If All Tests Passed",
    "Run Keyword If Any Tests Failed",
    "Run Keyword If Test Failed",
    "Run Keyword If Test Passed",
    "Run Keyword If Timeout Occurred",
    "Run Keyword Unless",
    "Run Keywords",
    "Set Global Variable",
    "Set Library Search Order",
    "Set Local Variable",
    "Set Log Level",
    "Set Suite Documentation",
    "Set Suite Metadata",
    "Set Suite Variable",
    "Set Tags",
    "Set Task Variable",
    "Set Test Documentation",
    "Set Test Message",
    "Set Test Variable",
    "Set Variable",
    "Set Variable If",
    "Should Be Empty",
    "Should Be Equal",
    "Should Be Equal As Integers",
    "Should Be Equal As Numbers",
    "Should Be Equal As Strings",
    "Should Be True",
    "Should Contain",
    "Should Contain Any",
    "Should Contain X Times",
    "Should End With",
    "Should Match",
    "Should Match Regexp",
    "Should Not Be Empty",
    "Should Not Be Equal",
    "Should Not Be Equal As Integers",
    "Should Not Be Equal As Numbers",
    "Should Not Be Equal As Strings",
    "Should Not Be True",
    "Should Not Contain",
    "Should Not Contain Any",
    "Should Not End With",
    "Should Not Match",
    "Should Not Match Regexp",
    "Should Not Start With",
    "Should Start With",
    "Skip",
    "Skip If",
    "Sleep",
    "Variable Should Exist",
    "Variable Should Not Exist",
    "Wait Until Keyword Succeeds",
];

pub const BUILTIN_LIBRARY: &str = "BuiltIn";

/// Lookup into the built-in keyword table under normalisation.
pub fn find_builtin(name: &str) -> Option<KeywordInfo> {
    let wanted = normalize(name);
    BUILTIN_KEYWORDS
        .iter()
        .find(|kw| normalize(kw) == wanted)
        .map(|kw| KeywordInfo::library(*kw, BUILTIN_LIBRARY))
}
