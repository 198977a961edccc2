//! Macro persistence.
//!
//! Each stopped recording is written to its own file in the macros
//! directory, named `macro_000001.json`, `macro_000002.json`, ... Only the
//! newest `max_saved` files are kept.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::StorageError;
use super::instruction::InstructionMap;

const FILE_PREFIX: &str = "macro_";
const FILE_SUFFIX: &str = ".json";

/// A persisted macro.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMacro {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub instructions: Vec<InstructionMap>,
}

#[derive(Clone, Debug)]
pub struct MacroStorage {
    dir: PathBuf,
    max_saved: usize,
}

impl MacroStorage {
    pub fn with_dir(dir: impl Into<PathBuf>, max_saved: usize) -> Self {
        Self {
            dir: dir.into(),
            max_saved: max_saved.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a macro as the newest file, then prune old ones.
    pub fn save(&self, instructions: &[InstructionMap]) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let index = self
            .indexed_files()?
            .last()
            .map(|(index, _)| index + 1)
            .unwrap_or(1);
        let path = self.dir.join(format!("{}{:06}{}", FILE_PREFIX, index, FILE_SUFFIX));

        let saved = SavedMacro {
            name: format!("Macro {}", index),
            created_at: Utc::now(),
            instructions: instructions.to_vec(),
        };
        let content = serde_json::to_string_pretty(&saved).map_err(|source| {
            StorageError::Format {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, content).map_err(|e| StorageError::io(&path, e))?;

        info!(
            path = %path.display(),
            instructions = instructions.len(),
            "Saved macro"
        );
        self.prune()?;
        Ok(path)
    }

    /// Macro files, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, StorageError> {
        Ok(self.indexed_files()?.into_iter().map(|(_, p)| p).collect())
    }

    pub fn load(&self, path: &Path) -> Result<SavedMacro, StorageError> {
        let content = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| StorageError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_latest(&self) -> Result<Option<SavedMacro>, StorageError> {
        match self.indexed_files()?.last() {
            Some((_, path)) => self.load(path).map(Some),
            None => Ok(None),
        }
    }

    fn prune(&self) -> Result<(), StorageError> {
        let files = self.indexed_files()?;
        if files.len() <= self.max_saved {
            return Ok(());
        }
        let excess = files.len() - self.max_saved;
        for (_, path) in files.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Pruned old macro"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to prune old macro"),
            }
        }
        Ok(())
    }

    fn indexed_files(&self) -> Result<Vec<(u64, PathBuf)>, StorageError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let mut files: Vec<(u64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_str()?;
                let index = name
                    .strip_prefix(FILE_PREFIX)?
                    .strip_suffix(FILE_SUFFIX)?
                    .parse::<u64>()
                    .ok()?;
                Some((index, path))
            })
            .collect();
        files.sort_by_key(|(index, _)| *index);
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn map(id: &str) -> InstructionMap {
        [("id".to_string(), id.to_string())].into()
    }

    #[test]
    fn save_and_load_latest() {
        let dir = tempdir().unwrap();
        let storage = MacroStorage::with_dir(dir.path(), 5);

        assert_eq!(storage.load_latest().unwrap(), None);

        storage.save(&[map("first")]).unwrap();
        let path = storage.save(&[map("second"), map("third")]).unwrap();
        assert!(path.ends_with("macro_000002.json"));

        let latest = storage.load_latest().unwrap().unwrap();
        assert_eq!(latest.name, "Macro 2");
        assert_eq!(latest.instructions, vec![map("second"), map("third")]);
    }

    #[test]
    fn save_prunes_oldest_files() {
        let dir = tempdir().unwrap();
        let storage = MacroStorage::with_dir(dir.path(), 2);
        for i in 0..4 {
            storage.save(&[map(&i.to_string())]).unwrap();
        }

        let names: Vec<String> = storage
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["macro_000003.json", "macro_000004.json"]);
    }

    #[test]
    fn empty_macro_is_persisted() {
        let dir = tempdir().unwrap();
        let storage = MacroStorage::with_dir(dir.path().join("nested"), 3);
        storage.save(&[]).unwrap();

        let latest = storage.load_latest().unwrap().unwrap();
        assert!(latest.instructions.is_empty());
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("macro_abc.json"), "{}").unwrap();
        let storage = MacroStorage::with_dir(dir.path(), 3);
        assert!(storage.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_a_format_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("macro_000001.json"), "not json").unwrap();
        let storage = MacroStorage::with_dir(dir.path(), 3);
        assert!(matches!(
            storage.load_latest(),
            Err(StorageError::Format { .. })
        ));
    }
}
