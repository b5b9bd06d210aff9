//! Settings store for the RIDE engine.
//!
//! Hierarchical key-value configuration persisted as TOML. Keys are dotted
//! paths into nested tables (`"save.line separator"`). Every mutation goes
//! through [`Settings::set`], which notifies the registered change listener
//! with the mutated key; the engine wires that to its settings-changed
//! event. Directory loading consults the `excludes` list of shell-style
//! glob patterns.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Value;

pub mod excludes;

pub use excludes::Excludes;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Callback invoked with the dotted key of every mutated setting.
pub type ChangeListener = Box<dyn Fn(&str) + Send>;

/// Hierarchical settings store.
#[derive(Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(flatten)]
    values: toml::Table,
    #[serde(skip)]
    path: Option<PathBuf>,
    #[serde(skip)]
    listener: Option<ChangeListener>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("values", &self.values)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file; a missing file yields defaults bound
    /// to that path so a later `save()` creates it.
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            let mut settings = Self::default();
            settings.path = Some(config_path.to_path_buf());
            return Ok(settings);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;
        let values: toml::Table =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            values,
            path: Some(config_path.to_path_buf()),
            listener: None,
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            anyhow::bail!("settings store has no backing file");
        };
        self.save_to_path(path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.values)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Register the change listener; replaces any previous one.
    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    /// Raw value lookup by dotted key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = key.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .map(expand)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get(key)
            .and_then(Value::as_integer)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(default)
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set a value by dotted key, creating intermediate tables, and notify
    /// the change listener.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let segments: Vec<&str> = key.split('.').collect();
        let mut table = &mut self.values;
        for segment in &segments[..segments.len() - 1] {
            let entry = table
                .entry(segment.to_string())
                .or_insert_with(|| Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(toml::Table::new());
            }
            table = entry
                .as_table_mut()
                .unwrap_or_else(|| unreachable!("entry was just made a table"));
        }
        if let Some(last) = segments.last() {
            table.insert(last.to_string(), value.into());
        }
        if let Some(listener) = &self.listener {
            listener(key);
        }
    }

    /// The exclude pattern list consulted by directory loading.
    pub fn excludes(&self) -> Excludes {
        Excludes::new(self.get_list(excludes::EXCLUDES_KEY))
    }

    /// Add exclude patterns, deduplicated, and notify.
    pub fn update_excludes<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut current = self.get_list(excludes::EXCLUDES_KEY);
        for pattern in patterns {
            let pattern = pattern.into();
            if !current.contains(&pattern) {
                current.push(pattern);
            }
        }
        self.set_excludes(current);
    }

    /// Remove exclude patterns and notify.
    pub fn remove_excludes<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let doomed: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let current: Vec<String> = self
            .get_list(excludes::EXCLUDES_KEY)
            .into_iter()
            .filter(|p| !doomed.contains(p))
            .collect();
        self.set_excludes(current);
    }

    fn set_excludes(&mut self, patterns: Vec<String>) {
        let array: Vec<Value> = patterns.into_iter().map(Value::String).collect();
        self.set(excludes::EXCLUDES_KEY, Value::Array(array));
    }
}

/// Expand `~` and environment variables in configured strings.
fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn get_and_set_roundtrip() {
        let mut settings = Settings::new();
        settings.set("save.pipe separated", true);
        settings.set("save.txt separating spaces", 4);
        settings.set("default directory", "/tmp/suites");

        assert!(settings.get_bool("save.pipe separated", false));
        assert_eq!(settings.get_usize("save.txt separating spaces", 2), 4);
        assert_eq!(settings.get_str("default directory", ""), "/tmp/suites");
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = Settings::new();
        assert_eq!(settings.get_str("no.such.key", "fallback"), "fallback");
        assert!(!settings.get_bool("nope", false));
        assert_eq!(settings.get_usize("nope", 7), 7);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");

        let mut settings = Settings::load_from_path(&path).unwrap();
        settings.set("save.line separator", "\n");
        settings.set("general.recent files", 12);
        settings.save().unwrap();

        let loaded = Settings::load_from_path(&path).unwrap();
        assert_eq!(loaded.get_str("save.line separator", ""), "\n");
        assert_eq!(loaded.get_usize("general.recent files", 0), 12);
    }

    #[test]
    fn listener_sees_every_mutated_key() {
        let (tx, rx) = mpsc::channel();
        let mut settings = Settings::new();
        settings.set_listener(Box::new(move |key| {
            let _ = tx.send(key.to_string());
        }));

        settings.set("a", 1);
        settings.set("nested.b", "x");

        let keys: Vec<String> = rx.try_iter().collect();
        assert_eq!(keys, vec!["a".to_string(), "nested.b".to_string()]);
    }

    #[test]
    fn listener_fires_for_exclude_updates() {
        let counter = std::sync::Arc::new(Mutex::new(0usize));
        let inner = counter.clone();
        let mut settings = Settings::new();
        settings.set_listener(Box::new(move |_| {
            *inner.lock().unwrap() += 1;
        }));

        settings.update_excludes(["*/build/*"]);
        settings.remove_excludes(["*/build/*"]);

        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[test]
    fn excludes_roundtrip_through_settings() {
        let mut settings = Settings::new();
        settings.update_excludes(["/abs/path", "*.tmp"]);
        settings.update_excludes(["/abs/path"]); // duplicate ignored

        let excludes = settings.excludes();
        assert!(excludes.contains(Path::new("/abs/path/inner/file.robot")));
        assert!(!excludes.contains(Path::new("/other/file.robot")));

        settings.remove_excludes(["/abs/path"]);
        assert!(
            !settings
                .excludes()
                .contains(Path::new("/abs/path/inner/file.robot"))
        );
    }

    #[test]
    fn string_values_are_shell_expanded() {
        unsafe {
            std::env::set_var("RIDE_TEST_ROOT", "/data/suites");
        }
        let mut settings = Settings::new();
        settings.set("default directory", "$RIDE_TEST_ROOT/project");
        assert_eq!(
            settings.get_str("default directory", ""),
            "/data/suites/project"
        );
        unsafe {
            std::env::remove_var("RIDE_TEST_ROOT");
        }
    }
}
