//! Persistence for fetched payloads
//!
//! A [`Store`] is a plain blocking sink. The fetch path never calls it directly;
//! it always goes through the [`BlockingOffloader`](crate::offload::BlockingOffloader).

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Blocking "write named bytes somewhere" operation
pub trait Store: Send + Sync + 'static {
    /// Persist `bytes` under `name`
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Writes each payload to `{dir}/{name}`, creating `dir` on first use
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory payloads are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Store for FileStore {
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        // Names come from remote metadata in some modes
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to write unsafe file name {name:?}"),
            ));
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(name), bytes)
    }
}

/// In-memory store, handy for embedding and tests
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the payload saved under `name`
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().get(name).cloned()
    }

    /// Names saved so far, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of payloads saved
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been saved
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-written
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
