//! File persistence: the parser seam and save-with-backup.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use ride_config::Settings;

use crate::error::{CommandError, ParseError};
use crate::model::DataFile;

/// Serialisation knobs resolved from settings at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub line_separator: String,
    pub pipe_separated: bool,
    pub txt_separating_spaces: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            line_separator: native_line_separator().to_string(),
            pipe_separated: false,
            txt_separating_spaces: 4,
        }
    }
}

impl WriteOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let line_separator = match settings
            .get_str("line separator", "native")
            .to_ascii_lowercase()
            .as_str()
        {
            "crlf" | "windows" => "\r\n".to_string(),
            "lf" | "unix" => "\n".to_string(),
            _ => native_line_separator().to_string(),
        };
        let pipe_separated = settings.get_str("txt format separator", "space") == "pipe";
        let txt_separating_spaces = settings.get_usize("txt number of spaces", 4).max(1);
        Self {
            line_separator,
            pipe_separated,
            txt_separating_spaces,
        }
    }
}

fn native_line_separator() -> &'static str {
    if cfg!(windows) { "\r\n" } else { "\n" }
}

/// Parser/serialiser collaborator. The engine never touches the concrete
/// file-format grammar itself.
pub trait DataParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<DataFile, ParseError>;

    fn write(
        &self,
        data: &DataFile,
        path: &Path,
        options: &WriteOptions,
    ) -> Result<(), ParseError>;
}

/// Write `data` to its source path, keeping the previous file as a backup
/// until the write succeeds.
///
/// The existing file is moved into a temp directory next to the target
/// before writing. On write failure the backup is moved back and the error
/// surfaces; on success the temp directory is dropped with the backup in it.
pub fn serialize_file(
    parser: &dyn DataParser,
    data: &DataFile,
    options: &WriteOptions,
) -> Result<(), CommandError> {
    let target = data.source.as_path();
    let parent = target.parent().ok_or_else(|| {
        CommandError::InvalidTarget(format!("{} has no parent directory", target.display()))
    })?;
    fs::create_dir_all(parent)?;

    let backup_dir = tempfile::Builder::new()
        .prefix(".ride-backup-")
        .tempdir_in(parent)?;
    let backup = target
        .file_name()
        .map(|name| backup_dir.path().join(name))
        .filter(|_| target.exists());
    if let Some(backup) = &backup {
        fs::rename(target, backup)?;
    }

    match parser.write(data, target, options) {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(backup) = &backup {
                if let Err(restore) = restore_backup(backup, target) {
                    tracing::error!(
                        target = %target.display(),
                        %restore,
                        "could not restore backup after failed save"
                    );
                }
            }
            Err(err.into())
        }
    }
}

fn restore_backup(backup: &Path, target: &Path) -> std::io::Result<()> {
    if target.exists() {
        fs::remove_file(target)?;
    }
    fs::rename(backup, target)
}

/// Modification time of `path`, `None` when unreadable.
pub fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataFileKind;
    use pretty_assertions::assert_eq;

    struct LineParser;

    impl DataParser for LineParser {
        fn parse(&self, path: &Path) -> Result<DataFile, ParseError> {
            Ok(DataFile::new(path, DataFileKind::Suite))
        }

        fn write(
            &self,
            data: &DataFile,
            path: &Path,
            options: &WriteOptions,
        ) -> Result<(), ParseError> {
            let body = format!("written{}", options.line_separator);
            fs::write(path, body).map_err(|e| ParseError::new(data.source.clone(), e.to_string()))
        }
    }

    struct FailingParser;

    impl DataParser for FailingParser {
        fn parse(&self, path: &Path) -> Result<DataFile, ParseError> {
            Err(ParseError::new(path, "unreadable"))
        }

        fn write(
            &self,
            data: &DataFile,
            path: &Path,
            _options: &WriteOptions,
        ) -> Result<(), ParseError> {
            // Leave a partial file behind, like an interrupted writer would.
            let _ = fs::write(path, "partial");
            Err(ParseError::new(data.source.clone(), "disk full"))
        }
    }

    #[test]
    fn successful_save_replaces_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("suite.robot");
        fs::write(&target, "old content").unwrap();
        let data = DataFile::new(&target, DataFileKind::Suite);

        serialize_file(&LineParser, &data, &WriteOptions::default()).unwrap();

        let content = fs::read_to_string(&target).unwrap();
        assert_eq!(content, format!("written{}", native_line_separator()));
        // Backup dir is gone.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_save_restores_the_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("suite.robot");
        fs::write(&target, "old content").unwrap();
        let data = DataFile::new(&target, DataFileKind::Suite);

        let err = serialize_file(&FailingParser, &data, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, CommandError::Parse(_)));
        assert_eq!(fs::read_to_string(&target).unwrap(), "old content");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn saving_a_new_file_needs_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fresh.robot");
        let data = DataFile::new(&target, DataFileKind::Suite);

        serialize_file(&LineParser, &data, &WriteOptions::default()).unwrap();
        assert!(target.exists());
    }

    #[test]
    fn write_options_resolve_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::load_from_path(&dir.path().join("s.toml")).unwrap();
        settings.set("line separator", "CRLF");
        settings.set("txt format separator", "pipe");
        settings.set("txt number of spaces", 0i64);

        let options = WriteOptions::from_settings(&settings);
        assert_eq!(options.line_separator, "\r\n");
        assert!(options.pipe_separated);
        assert_eq!(options.txt_separating_spaces, 1);
    }
}
