use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::configuration::settings::Settings;

pub const SETTINGS_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error("settings file {0} does not contain a JSON object")]
    NotAnObject(PathBuf),
}

/// Reads and writes the settings record as a single JSON file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted in `dir`, falling back to the working directory.
    pub fn in_dir(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(dir) => Self::new(dir.join(SETTINGS_FILE_NAME)),
            None => Self::new(SETTINGS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing or unreadable file yields default settings, which
    /// are written back so the next start finds a valid file.
    pub fn load(&self) -> Settings {
        match self.read() {
            Ok(settings) => settings,
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("No settings at {}, creating defaults", self.path.display());
                self.write_defaults()
            }
            Err(err) => {
                error!("Error loading configuration: {}", err);
                self.quarantine();
                self.write_defaults()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;

        let io_err = |source| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        let mut buffer = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
        settings.serialize(&mut serializer)?;
        buffer.push(b'\n');

        let mut staged = NamedTempFile::new_in(&dir).map_err(io_err)?;
        staged.write_all(&buffer).map_err(io_err)?;
        staged.as_file().sync_all().map_err(io_err)?;
        staged
            .persist(&self.path)
            .map_err(|source| ConfigError::Persist {
                path: self.path.clone(),
                source,
            })?;

        info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    fn read(&self) -> Result<Settings, ConfigError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(object) => Ok(Settings::from_partial(&object)),
            _ => Err(ConfigError::NotAnObject(self.path.clone())),
        }
    }

    fn write_defaults(&self) -> Settings {
        let settings = Settings::default();
        if let Err(err) = self.save(&settings) {
            warn!("Could not write default settings: {}", err);
        }
        settings
    }

    // Keeps an unreadable file around so a hand-edited API key is not lost.
    fn quarantine(&self) {
        if !self.path.exists() {
            return;
        }
        let mut aside = self.path.clone().into_os_string();
        aside.push(".corrupt");
        match fs::rename(&self.path, &aside) {
            Ok(()) => warn!("Moved unreadable settings to {}", Path::new(&aside).display()),
            Err(err) => warn!("Could not move unreadable settings aside: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with(contents: Option<&str>) -> (tempfile::TempDir, SettingsStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        if let Some(contents) = contents {
            fs::write(&path, contents).unwrap();
        }
        (dir, SettingsStore::new(path))
    }

    #[test]
    fn missing_file_yields_defaults_and_creates_it() {
        let (_dir, store) = store_with(None);

        let settings = store.load();

        assert_eq!(settings, Settings::default());
        assert!(settings.first_run);
        assert!(store.path().exists());
    }

    #[test]
    fn malformed_files_yield_valid_defaults() {
        for contents in ["", "{", "not json", "[1, 2, 3]", "\"text\"", "null", "42"] {
            let (_dir, store) = store_with(Some(contents));

            let settings = store.load();

            assert_eq!(settings, Settings::default(), "contents: {contents:?}");
            let reread: Value =
                serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
            assert!(reread.is_object());
        }
    }

    #[test]
    fn unreadable_file_is_moved_aside() {
        let (dir, store) = store_with(Some("{\"api_key\": \"secret\""));

        store.load();

        let aside = dir.path().join("config.json.corrupt");
        assert_eq!(
            fs::read_to_string(aside).unwrap(),
            "{\"api_key\": \"secret\""
        );
    }

    #[test]
    fn partial_file_is_merged() {
        let (_dir, store) = store_with(Some(r#"{"api_key": "k", "first_run": false}"#));

        let settings = store.load();

        assert_eq!(settings.api_key, "k");
        assert!(!settings.first_run);
        assert_eq!(settings.model, "gpt-4o");
    }

    #[test]
    fn save_after_load_is_idempotent() {
        let (_dir, store) = store_with(Some(
            r#"{"api_key": "k", "api_endpoint": "https://x/y", "model": "m", "first_run": false}"#,
        ));

        let loaded = store.load();
        store.save(&loaded).unwrap();
        let first = fs::read_to_string(store.path()).unwrap();
        let reloaded = store.load();
        store.save(&reloaded).unwrap();
        let second = fs::read_to_string(store.path()).unwrap();

        assert_eq!(loaded, reloaded);
        assert_eq!(first, second);
    }

    #[test]
    fn save_uses_four_space_indent_and_leaves_no_temp_files() {
        let (dir, store) = store_with(None);

        store.save(&Settings::default()).unwrap();

        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.contains("\n    \"api_key\": \"\""));
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join(SETTINGS_FILE_NAME));

        store.save(&Settings::default()).unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn save_reports_failure_instead_of_panicking() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();
        let store = SettingsStore::new(blocker.join(SETTINGS_FILE_NAME));

        assert!(store.save(&Settings::default()).is_err());
        assert_eq!(store.load(), Settings::default());
    }
}
