//! The per-file aggregate of parsed test data.

use std::path::{Path, PathBuf};

use crate::model::item::{SettingTable, TestCase, UserKeyword, VariableTable};

/// What a file on disk is to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileKind {
    /// A test case file.
    Suite,
    /// A directory with an init file (or none yet).
    Directory,
    /// A resource file: keywords and variables, no tests.
    Resource,
}

/// On-disk serialisation format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Robot,
    Resource,
    Txt,
    Tsv,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Robot => "robot",
            FileFormat::Resource => "resource",
            FileFormat::Txt => "txt",
            FileFormat::Tsv => "tsv",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "robot" => Some(FileFormat::Robot),
            "resource" => Some(FileFormat::Resource),
            "txt" => Some(FileFormat::Txt),
            "tsv" => Some(FileFormat::Tsv),
            _ => None,
        }
    }
}

/// Parsed content of one data file. Directories use their init file's
/// content (tests are not allowed there).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub source: PathBuf,
    pub kind: DataFileKind,
    pub setting_table: SettingTable,
    pub variable_table: VariableTable,
    pub keywords: Vec<UserKeyword>,
    pub tests: Vec<TestCase>,
    pub format: FileFormat,
}

impl DataFile {
    pub fn new(source: impl Into<PathBuf>, kind: DataFileKind) -> Self {
        let source = source.into();
        let format = FileFormat::from_path(&source).unwrap_or(FileFormat::Robot);
        Self {
            source,
            kind,
            setting_table: SettingTable::default(),
            variable_table: VariableTable::default(),
            keywords: Vec::new(),
            tests: Vec::new(),
            format,
        }
    }

    /// File name without extension, the name resources are referred to by.
    pub fn basename(&self) -> &str {
        self.source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }

    /// The directory the file lives in. For directory suites the source is
    /// the directory itself.
    pub fn directory(&self) -> &Path {
        if self.kind == DataFileKind::Directory {
            &self.source
        } else {
            self.source.parent().unwrap_or(Path::new(""))
        }
    }

    pub fn is_resource(&self) -> bool {
        self.kind == DataFileKind::Resource
    }

    pub fn keyword_names(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.name.as_str())
    }

    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|t| t.name.as_str())
    }
}
