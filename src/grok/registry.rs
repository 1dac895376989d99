use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use super::library::BUILTIN_SETS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Builtin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDefinition {
    pub name: String,
    pub body: String,
    pub origin: Origin,
    /// Pattern-set file the definition was loaded from, if any.
    pub set: Option<String>,
}

/// A malformed line in a pattern-set file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{set}:{line}: {message}")]
pub struct DefinitionError {
    pub set: String,
    /// 1-indexed line number
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
struct SetInfo {
    origin: Origin,
    source: String,
}

/// Named pattern definitions available to the compiler.
///
/// Lookups of undefined names return `None`; turning that into an
/// `UnknownPattern` error is the compiler's job.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    definitions: HashMap<String, PatternDefinition>,
    sets: BTreeMap<String, SetInfo>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry preloaded with every built-in pattern set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for set in BUILTIN_SETS {
            // Built-in sets ship with the binary and are covered by tests.
            if let Err(e) = registry.load_definitions(set.name, set.source, Origin::Builtin) {
                tracing::warn!("skipping malformed built-in definition: {e}");
            }
        }
        tracing::debug!(
            definitions = registry.len(),
            sets = registry.sets.len(),
            "loaded built-in patterns"
        );
        registry
    }

    /// Register a definition, replacing any previous one with the same name.
    /// Returns the replaced definition.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        body: impl Into<String>,
        origin: Origin,
    ) -> Option<PatternDefinition> {
        self.insert(PatternDefinition {
            name: name.into(),
            body: body.into(),
            origin,
            set: None,
        })
    }

    fn insert(&mut self, definition: PatternDefinition) -> Option<PatternDefinition> {
        let previous = self
            .definitions
            .insert(definition.name.clone(), definition);
        if let Some(prev) = &previous {
            tracing::debug!(name = %prev.name, origin = ?prev.origin, "pattern definition replaced");
        }
        previous
    }

    pub fn lookup(&self, name: &str) -> Option<&PatternDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Parse a pattern-set file (`NAME BODY` per line) and register every
    /// definition in it. Blank lines and `#` comments are skipped. On a
    /// malformed line nothing from the set is registered.
    pub fn load_definitions(
        &mut self,
        set: &str,
        source: &str,
        origin: Origin,
    ) -> Result<usize, DefinitionError> {
        let parsed = parse_definitions(set, source)?;
        let count = parsed.len();
        for (name, body) in parsed {
            self.insert(PatternDefinition {
                name,
                body,
                origin,
                set: Some(set.to_string()),
            });
        }
        self.sets.insert(
            set.to_string(),
            SetInfo {
                origin,
                source: source.to_string(),
            },
        );
        tracing::trace!(set, count, "loaded pattern set");
        Ok(count)
    }

    /// Names of loaded pattern sets, sorted.
    pub fn sets(&self) -> Vec<&str> {
        self.sets.keys().map(String::as_str).collect()
    }

    pub fn set_origin(&self, set: &str) -> Option<Origin> {
        self.sets.get(set).map(|s| s.origin)
    }

    /// Raw source text of a loaded pattern set.
    pub fn set_source(&self, set: &str) -> Option<&str> {
        self.sets.get(set).map(|s| s.source.as_str())
    }
}

fn parse_definitions(set: &str, source: &str) -> Result<Vec<(String, String)>, DefinitionError> {
    let mut out = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let err = |message: String| DefinitionError {
            set: set.to_string(),
            line: idx + 1,
            message,
        };

        let name_end = trimmed
            .find(char::is_whitespace)
            .ok_or_else(|| err(format!("definition `{trimmed}` has no body")))?;
        let name = &trimmed[..name_end];
        if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(err(format!("invalid pattern name `{name}`")));
        }
        let body = trimmed[name_end..].trim_start();
        out.push((name.to_string(), body.to_string()));
    }
    Ok(out)
}
