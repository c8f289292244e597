use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use tracing::{debug, error, info};

use crate::error::{AuthError, AuthResult};

/// String key/value persistence, the shape of browser localStorage
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> AuthResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> AuthResult<()>;

    fn remove_item(&self, key: &str) -> AuthResult<()>;

    /// Write several entries. Backends that can persist them in one step override this.
    fn set_items(&self, entries: &[(&str, String)]) -> AuthResult<()> {
        for (key, value) in entries {
            self.set_item(key, value)?;
        }
        Ok(())
    }

    /// Remove several entries. Missing keys are not an error.
    fn remove_items(&self, keys: &[&str]) -> AuthResult<()> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Storage("storage lock poisoned".to_string())
}

/// Volatile storage, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.items.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> AuthResult<()> {
        self.items
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> AuthResult<()> {
        self.items.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn set_items(&self, entries: &[(&str, String)]) -> AuthResult<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        for (key, value) in entries {
            items.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[&str]) -> AuthResult<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }
}

/// Storage persisted as a flat JSON object in a single file.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, so a batch written with `set_items` lands all at once.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`, creating it lazily on first write
    pub fn open(path: impl Into<PathBuf>) -> AuthResult<Self> {
        let path = path.into();

        let items = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| {
                error!(path = %path.display(), error = %e, "Failed to read session file");
                AuthError::Storage(format!("failed to read {}: {}", path.display(), e))
            })?;

            if contents.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    error!(path = %path.display(), error = %e, "Session file is not a JSON object of strings");
                    AuthError::Storage(format!("failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            debug!(path = %path.display(), "No session file yet");
            HashMap::new()
        };

        info!(path = %path.display(), entries = items.len(), "Opened session file");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn persist(&self, items: &HashMap<String, String>) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AuthError::Storage(format!("failed to create {}: {}", parent.display(), e)))?;
            }
        }

        let json = serde_json::to_string_pretty(items)
            .map_err(|e| AuthError::Storage(format!("failed to serialize session file: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| AuthError::Storage(format!("failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            AuthError::Storage(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), entries = items.len(), "Session file saved");
        Ok(())
    }

    /// Apply `f` to a copy of the entries; the copy replaces the cache only once it is on disk
    fn mutate(&self, f: impl FnOnce(&mut HashMap<String, String>) -> bool) -> AuthResult<()> {
        let mut items = self.items.lock().map_err(poisoned)?;
        let mut staged = items.clone();
        if f(&mut staged) {
            self.persist(&staged)?;
            *items = staged;
        }
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.items.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> AuthResult<()> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove_item(&self, key: &str) -> AuthResult<()> {
        self.mutate(|items| items.remove(key).is_some())
    }

    fn set_items(&self, entries: &[(&str, String)]) -> AuthResult<()> {
        self.mutate(|items| {
            for (key, value) in entries {
                items.insert(key.to_string(), value.clone());
            }
            true
        })
    }

    fn remove_items(&self, keys: &[&str]) -> AuthResult<()> {
        self.mutate(|items| {
            let mut changed = false;
            for key in keys {
                changed |= items.remove(*key).is_some();
            }
            changed
        })
    }
}
