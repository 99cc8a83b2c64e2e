//! Local persistence
//!
//! JSON documents under a base directory: the wallet session, the bridge
//! history cache and the file-backed request mirror. Writes are plain
//! read-modify-write; concurrent processes are not synchronised and the
//! last write wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::error::StackPayError;

#[derive(Clone, Debug)]
pub struct Storage {
    base_path: PathBuf,
}

impl Storage {
    /// Create a new storage instance with the default base directory ("./stackpay-data")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./stackpay-data"),
        }
    }

    /// Create storage with custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    /// Whether a document exists
    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Save a JSON document, creating parent directories as needed
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StackPayError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StackPayError::Storage(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a JSON document, `None` if it does not exist
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StackPayError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&contents).map_err(|e| {
            StackPayError::Storage(format!("corrupt document {}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    /// Load a document or fall back to the type's default
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StackPayError> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    /// Remove a document; missing documents are not an error
    pub fn remove(&self, key: &str) -> Result<(), StackPayError> {
        let path = self.path_for(key);
        if path.exists() {
            log::debug!("Removing {:?}", path);
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// List document keys inside a sub-directory (e.g. "mirror")
    pub fn list(&self, dir: &str) -> Result<Vec<String>, StackPayError> {
        let path = self.base_path.join(dir);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                keys.push(format!("{}/{}", dir, stem));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
