use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::PersistenceError;

/// A directory of named save files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveCatalog {
    dir: PathBuf,
}

impl SaveCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names of every save, sorted. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>, PersistenceError> {
        let to_error = |source: io::Error| PersistenceError::SaveDirectory {
            path: self.dir.clone(),
            source,
        };
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(to_error(error)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(to_error)?;
            if !entry.file_type().map_err(to_error)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolves a save name to a path inside the catalog directory. Names are
    /// plain file names; anything that could escape the directory is refused.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        let invalid = |reason| PersistenceError::InvalidSaveName {
            name: name.to_string(),
            reason,
        };
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(invalid("name is empty"));
        }
        if trimmed.contains(['/', '\\']) {
            return Err(invalid("name must not contain path separators"));
        }
        if trimmed == "." || trimmed == ".." {
            return Err(invalid("name must not refer to a directory"));
        }
        Ok(self.dir.join(trimmed))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|path| path.is_file())
    }
}
