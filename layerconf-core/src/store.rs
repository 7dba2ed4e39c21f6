use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Persistent per-user key-value medium holding overrides. Keys arrive
/// already namespace-qualified (`"{namespace}.{key}"`).
pub trait OverrideStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and short-lived embeddings.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverrideStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Store backed by a flat JSON object file, written atomically via a
/// temp-file rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|err| {
            Error::Storage(format!(
                "failed to read store '{}': {err}",
                self.path.display()
            ))
        })?;
        let parsed: Value = serde_json::from_str(&content).map_err(|err| {
            Error::Storage(format!(
                "failed to parse store '{}': {err}",
                self.path.display()
            ))
        })?;

        match parsed {
            Value::Object(entries) => Ok(entries),
            _ => Err(Error::Storage(format!(
                "store '{}' must contain a JSON object at root",
                self.path.display()
            ))),
        }
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| Error::Storage(format!("failed to create store dir: {err}")))?;
        }

        let rendered = serde_json::to_string_pretty(&Value::Object(entries.clone()))
            .map_err(|err| Error::Storage(format!("failed to encode store: {err}")))?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp_path).map_err(|err| {
                Error::Storage(format!("failed to create '{}': {err}", tmp_path.display()))
            })?;
            file.write_all(rendered.as_bytes())
                .map_err(|err| Error::Storage(format!("failed to write store: {err}")))?;
            file.sync_all()
                .map_err(|err| Error::Storage(format!("failed to sync store: {err}")))?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|err| {
            Error::Storage(format!(
                "failed to move store into '{}': {err}",
                self.path.display()
            ))
        })
    }
}

impl OverrideStore for JsonFileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let entries = self.read_entries()?;
        match entries.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(Error::Storage(format!(
                "store entry '{key}' holds {other}, expected a string"
            ))),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_owned(), Value::String(value.to_owned()));
        self.write_entries(&entries)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}
