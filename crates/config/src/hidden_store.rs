//! Durable storage for the hidden set

use crate::persistence::write_atomic;
use crate::{ConfigError, ConfigResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use syncwatch_core::HiddenSet;

/// JSON file holding the keys the user hid
///
/// The file is a plain array of strings. It is advisory state: a missing or
/// unreadable file loads as an empty set instead of failing.
#[derive(Debug, Clone)]
pub struct HiddenSetFile {
    path: PathBuf,
}

impl HiddenSetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> HiddenSet {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return HiddenSet::new(),
            Err(e) => {
                log::warn!(
                    "Could not read hidden set at {}: {}; starting empty",
                    self.path.display(),
                    e
                );
                return HiddenSet::new();
            }
        };

        if contents.trim().is_empty() {
            return HiddenSet::new();
        }

        match serde_json::from_str::<HiddenSet>(&contents) {
            Ok(set) => {
                log::debug!("Loaded {} hidden keys", set.len());
                set
            }
            Err(e) => {
                log::warn!(
                    "Hidden set at {} is corrupt ({}); starting empty",
                    self.path.display(),
                    e
                );
                HiddenSet::new()
            }
        }
    }

    pub fn save(&self, set: &HiddenSet) -> ConfigResult<()> {
        let json = serde_json::to_string(set).map_err(|e| ConfigError::Encode {
            what: "hidden set",
            source: e,
        })?;
        write_atomic(&self.path, &json)?;
        log::debug!("Saved {} hidden keys to {}", set.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, HiddenSetFile) {
        let dir = TempDir::new().expect("temp dir");
        let file = HiddenSetFile::new(dir.path().join("hidden.json"));
        (dir, file)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, file) = store();
        assert!(file.load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, file) = store();
        let set: HiddenSet = ["tmdb:1", "imdb:tt2"].into_iter().collect();
        file.save(&set).expect("save");

        assert_eq!(file.load(), set);
        let raw = fs::read_to_string(file.path()).expect("read");
        assert_eq!(raw, r#"["tmdb:1","imdb:tt2"]"#);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let (_dir, file) = store();
        fs::write(file.path(), "{not json").expect("write");
        assert!(file.load().is_empty());
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let (_dir, file) = store();
        fs::write(file.path(), r#"{"keys": ["a"]}"#).expect("write");
        assert!(file.load().is_empty());
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = TempDir::new().expect("temp dir");
        let file = HiddenSetFile::new(dir.path().join("state").join("hidden.json"));
        file.save(&HiddenSet::new()).expect("save");
        assert!(file.path().exists());
    }
}
