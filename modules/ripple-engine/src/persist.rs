//! Durable key/value storage and the prefixed persistence mirror.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;

use crate::codec;
use crate::error::{Result, RippleError};

/// Synchronous string key/value store.
///
/// Writes are fire-and-forget: implementations that can fail log the failure
/// and keep serving their in-memory view.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

// ---------------------------------------------------------------------------
// MemoryStorage (tests, ephemeral sessions)
// ---------------------------------------------------------------------------

/// In-memory storage. Share it through `Rc` to inspect writes or to mount a
/// second engine against the same data.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries (for test assertions).
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

// ---------------------------------------------------------------------------
// FileStorage (JSON object on disk, write-through)
// ---------------------------------------------------------------------------

/// Storage backed by a single JSON object file. Every write rewrites the file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                RippleError::Storage(format!("{} is not a JSON object: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&*self.entries.borrow())?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write storage file");
        }
    }
}

// ---------------------------------------------------------------------------
// Rc<S> blanket: callers keep a handle for assertions
// ---------------------------------------------------------------------------

impl<S: Storage + ?Sized> Storage for Rc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value)
    }
}

// ---------------------------------------------------------------------------
// Persistence: `{prefix}-{key}` mirror of state writes
// ---------------------------------------------------------------------------

/// Namespaced mirror of the state store.
#[derive(Clone)]
pub struct Persistence {
    prefix: String,
    storage: Rc<dyn Storage>,
}

impl Persistence {
    pub fn new(prefix: impl Into<String>, storage: Rc<dyn Storage>) -> Self {
        Self {
            prefix: prefix.into(),
            storage,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn storage_key(&self, key: &str) -> String {
        format!("{}-{}", self.prefix, key)
    }

    /// Decoded stored value, if any.
    pub fn load(&self, key: &str) -> Option<Value> {
        self.storage
            .get(&self.storage_key(key))
            .map(|raw| codec::decode(&raw))
    }

    pub fn save(&self, key: &str, value: &Value) {
        self.storage
            .set(&self.storage_key(key), &codec::encode(value));
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
