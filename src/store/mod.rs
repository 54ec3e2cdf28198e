//! Persistence: a string key-value store and the records kept in it.
//!
//! The editor keeps two logical records, `resources` and `templates`, each
//! a JSON document under its own key. Backends must report running out of
//! space as [`Error::QuotaExceeded`] so template saving can evict and retry.

pub mod resources;
pub mod templates;

pub use resources::{filename_token, Resource, ResourceCategory, ResourceStore};
pub use templates::{Template, TemplateStore};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Minimal key-value persistence surface
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

fn quota_error(key: &str, needed: usize, quota: usize, others: usize) -> Error {
    Error::QuotaExceeded {
        key: key.to_string(),
        needed,
        available: quota.saturating_sub(others),
    }
}

/// In-memory store with an optional byte quota over all keys and values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }

    /// Bytes currently used (keys plus values)
    pub fn used(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota {
            let current = self.entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let others = self.used() - current;
            let needed = key.len() + value.len();
            if others + needed > quota {
                return Err(quota_error(key, needed, quota, others));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary sibling and are renamed into place, so a failed
/// write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota: Option<u64>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, quota: None })
    }

    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::Storage(format!("invalid store key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn used_except(&self, skip: &Path) -> Result<u64> {
        let mut total = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path == skip || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            total += entry.metadata()?.len();
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("reading {}: {e}", path.display()))),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(quota) = self.quota {
            let others = self.used_except(&path)?;
            if others + value.len() as u64 > quota {
                return Err(quota_error(
                    key,
                    value.len(),
                    quota as usize,
                    others as usize,
                ));
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp);
                Error::Storage(format!("writing {}: {e}", path.display()))
            })
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("removing {}: {e}", path.display()))),
        }
    }
}

/// Read and parse a JSON record, `None` when the key is absent.
/// Read and decode `key`. A record that no longer parses is reported and
/// treated as missing, so the next save replaces it.
pub(crate) fn load_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::error!("store: record '{key}' is unreadable ({e}); starting empty");
            Ok(None)
        }
    }
}

pub(crate) fn save_json<T: serde::Serialize>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "coverkit-store-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn memory_store_enforces_quota() {
        let mut s = MemoryStore::with_quota(10);
        s.set("a", "12345").unwrap();
        let err = s.set("b", "123456").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(s.get("b").unwrap(), None);
        // replacing a value only counts the new size
        s.set("a", "123456789").unwrap();
        assert_eq!(s.used(), 10);
        s.remove("a").unwrap();
        assert_eq!(s.get("a").unwrap(), None);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = temp_dir("rt");
        let mut s = FileStore::open(&dir).unwrap();
        assert_eq!(s.get("templates").unwrap(), None);
        s.set("templates", "[1,2]").unwrap();
        assert_eq!(s.get("templates").unwrap().as_deref(), Some("[1,2]"));
        assert!(!dir.join("templates.json.tmp").exists());
        s.remove("templates").unwrap();
        s.remove("templates").unwrap();
        assert_eq!(s.get("templates").unwrap(), None);
        assert!(s.set("../escape", "x").is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_store_quota_counts_other_keys() {
        let dir = temp_dir("quota");
        let mut s = FileStore::open(&dir).unwrap().with_quota(8);
        s.set("resources", "12345").unwrap();
        let err = s.set("templates", "1234").unwrap_err();
        assert!(err.is_quota_exceeded());
        s.set("resources", "1234567").unwrap();
        let _ = fs::remove_dir_all(&dir);
    }
}
