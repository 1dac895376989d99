//! Saved-pattern library: named grok patterns kept between sessions.

pub mod json_file;
pub mod memory;

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Environment variable that overrides the library location.
pub const LIBRARY_ENV: &str = "GROKDEBUG_LIBRARY";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no saved pattern titled `{0}`")]
    NotFound(String),
    #[error("pattern title must not be empty")]
    EmptyTitle,
    #[error("failed to access pattern library {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("pattern library {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// CRUD over saved patterns, keyed by title. Saving an existing title
/// replaces its text.
pub trait PatternStore: Send + Sync {
    /// All saved titles, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn get(&self, title: &str) -> Result<String, StoreError>;

    fn save(&self, title: &str, pattern_text: &str) -> Result<(), StoreError>;

    fn delete(&self, title: &str) -> Result<(), StoreError>;
}

pub(crate) fn check_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        Err(StoreError::EmptyTitle)
    } else {
        Ok(())
    }
}

/// Where the library lives when no path is configured:
/// `$GROKDEBUG_LIBRARY`, then `$XDG_DATA_HOME/grokdebug/patterns.json`,
/// then `~/.local/share/grokdebug/patterns.json`.
pub fn default_library_path() -> Option<PathBuf> {
    library_path_from(|key| std::env::var_os(key))
}

fn library_path_from(env: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty()).map(PathBuf::from);
    if let Some(path) = non_empty(LIBRARY_ENV) {
        return Some(path);
    }
    let data_dir = non_empty("XDG_DATA_HOME")
        .or_else(|| non_empty("HOME").map(|home| home.join(".local").join("share")))?;
    Some(data_dir.join("grokdebug").join("patterns.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_env_wins() {
        let path = library_path_from(lookup(&[
            (LIBRARY_ENV, "/tmp/lib.json"),
            ("XDG_DATA_HOME", "/xdg"),
            ("HOME", "/home/u"),
        ]));
        assert_eq!(path.as_deref(), Some(Path::new("/tmp/lib.json")));
    }

    #[test]
    fn xdg_data_home_next() {
        let path = library_path_from(lookup(&[("XDG_DATA_HOME", "/xdg"), ("HOME", "/home/u")]));
        assert_eq!(
            path.as_deref(),
            Some(Path::new("/xdg/grokdebug/patterns.json"))
        );
    }

    #[test]
    fn home_fallback() {
        let path = library_path_from(lookup(&[("XDG_DATA_HOME", ""), ("HOME", "/home/u")]));
        assert_eq!(
            path.as_deref(),
            Some(Path::new("/home/u/.local/share/grokdebug/patterns.json"))
        );
    }

    #[test]
    fn nothing_set() {
        assert!(library_path_from(lookup(&[])).is_none());
    }

    #[test]
    fn blank_titles_rejected() {
        assert!(matches!(check_title(""), Err(StoreError::EmptyTitle)));
        assert!(matches!(check_title(" \t"), Err(StoreError::EmptyTitle)));
        assert!(check_title("apache").is_ok());
    }
}
