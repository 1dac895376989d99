use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use super::{check_title, PatternStore, StoreError};

/// A pattern library persisted as one flat JSON object, `{"title": "text"}`.
///
/// The whole file is loaded on open. Every change rewrites it through a
/// temp file and a rename so a crash never leaves a half-written library.
/// Writes are serialized by the lock; concurrent processes are not
/// coordinated and the last writer wins.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the library at `path`. A missing file is an empty library; the
    /// file is created on the first save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = load_entries(&path)?;
        tracing::debug!(path = %path.display(), count = entries.len(), "opened pattern library");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(io_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        tracing::trace!(path = %self.path.display(), count = entries.len(), "flushed pattern library");
        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }
    serde_json::from_slice(&data).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl PatternStore for JsonFileStore {
    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }

    fn get(&self, title: &str) -> Result<String, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(title)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(title.to_string()))
    }

    fn save(&self, title: &str, pattern_text: &str) -> Result<(), StoreError> {
        check_title(title)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let previous = entries.insert(title.to_string(), pattern_text.to_string());
        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(text) => entries.insert(title.to_string(), text),
                None => entries.remove(title),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, title: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(previous) = entries.remove(title) else {
            return Err(StoreError::NotFound(title.to_string()));
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(title.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}
