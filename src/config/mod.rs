use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_yml::Value;

use crate::formatter::FORMATS;
use crate::grok::CastPolicy;

pub const CONFIG_FILE: &str = ".grokdebug.yml";

/// Settings read from `.grokdebug.yml`. Every key is optional; command-line
/// flags take precedence over anything set here.
#[derive(Debug, Default)]
pub struct GrokConfig {
    /// Directory holding the config file, when one was loaded.
    config_dir: Option<PathBuf>,
    pattern_dirs: Vec<PathBuf>,
    library: Option<PathBuf>,
    cast_policy: Option<CastPolicy>,
    max_depth: Option<usize>,
    format: Option<String>,
}

/// Load config from the given path, or look for `.grokdebug.yml` in the
/// current directory. Returns an empty config if the file doesn't exist.
pub fn load_config(path: Option<&Path>) -> Result<GrokConfig> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => Path::new(CONFIG_FILE).to_path_buf(),
    };

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "no config file");
        return Ok(GrokConfig::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    let mut config = parse_config(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    let dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    // Relative paths in the file are relative to the file, not the cwd.
    for pattern_dir in &mut config.pattern_dirs {
        if pattern_dir.is_relative() {
            *pattern_dir = dir.join(&*pattern_dir);
        }
    }
    if let Some(library) = &mut config.library {
        if library.is_relative() {
            *library = dir.join(&*library);
        }
    }
    config.config_dir = Some(dir);
    tracing::debug!(path = %config_path.display(), "loaded config");
    Ok(config)
}

fn parse_config(contents: &str) -> Result<GrokConfig> {
    let mut config = GrokConfig::default();
    if contents.trim().is_empty() {
        return Ok(config);
    }
    let raw: Value = serde_yml::from_str(contents)?;

    let map = match raw {
        Value::Mapping(map) => map,
        Value::Null => return Ok(config),
        _ => bail!("expected a mapping at the top level"),
    };

    for (key, value) in &map {
        let Some(key) = key.as_str() else { continue };
        match key {
            "pattern_dirs" => {
                let Some(list) = value_to_string_list(value) else {
                    bail!("`pattern_dirs` must be a list of paths");
                };
                config.pattern_dirs = list.into_iter().map(PathBuf::from).collect();
            }
            "library" => {
                let Some(s) = value.as_str() else {
                    bail!("`library` must be a path");
                };
                config.library = Some(PathBuf::from(s));
            }
            "cast_policy" => {
                config.cast_policy = Some(match value.as_str() {
                    Some("lenient") => CastPolicy::Lenient,
                    Some("strict") => CastPolicy::Strict,
                    _ => bail!("`cast_policy` must be `lenient` or `strict`"),
                });
            }
            "max_depth" => {
                let Some(n) = value.as_u64().filter(|n| *n > 0) else {
                    bail!("`max_depth` must be a positive integer");
                };
                config.max_depth = Some(n as usize);
            }
            "format" => match value.as_str() {
                Some(f) if FORMATS.contains(&f) => config.format = Some(f.to_string()),
                _ => bail!("`format` must be one of {}", FORMATS.join(", ")),
            },
            other => tracing::warn!("ignoring unknown config key `{other}`"),
        }
    }

    Ok(config)
}

fn value_to_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        _ => value.as_sequence().map(|seq| {
            seq.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        }),
    }
}

impl GrokConfig {
    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    pub fn pattern_dirs(&self) -> &[PathBuf] {
        &self.pattern_dirs
    }

    pub fn library(&self) -> Option<&Path> {
        self.library.as_deref()
    }

    pub fn cast_policy(&self) -> Option<CastPolicy> {
        self.cast_policy
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_config_returns_empty() {
        let config = load_config(Some(Path::new("/nonexistent/.grokdebug.yml"))).unwrap();
        assert!(config.config_dir().is_none());
        assert!(config.pattern_dirs().is_empty());
        assert!(config.cast_policy().is_none());
        assert!(config.max_depth().is_none());
    }

    #[test]
    fn full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "pattern_dirs:\n  - patterns\n  - /abs/patterns\nlibrary: lib.json\ncast_policy: strict\nmax_depth: 10\nformat: csv\n",
        );
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.config_dir(), Some(dir.path()));
        assert_eq!(
            config.pattern_dirs(),
            &[dir.path().join("patterns"), PathBuf::from("/abs/patterns")]
        );
        assert_eq!(config.library(), Some(dir.path().join("lib.json").as_path()));
        assert_eq!(config.cast_policy(), Some(CastPolicy::Strict));
        assert_eq!(config.max_depth(), Some(10));
        assert_eq!(config.format(), Some("csv"));
    }

    #[test]
    fn single_pattern_dir_as_string() {
        let config = parse_config("pattern_dirs: mine\n").unwrap();
        assert_eq!(config.pattern_dirs(), &[PathBuf::from("mine")]);
    }

    #[test]
    fn empty_file_is_default() {
        let config = parse_config("").unwrap();
        assert!(config.format().is_none());
        let config = parse_config("# only a comment\n").unwrap();
        assert!(config.format().is_none());
    }

    #[test]
    fn unknown_keys_ignored() {
        let config = parse_config("colour: blue\nmax_depth: 5\n").unwrap();
        assert_eq!(config.max_depth(), Some(5));
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(parse_config("cast_policy: sometimes\n").is_err());
        assert!(parse_config("max_depth: 0\n").is_err());
        assert!(parse_config("max_depth: many\n").is_err());
        assert!(parse_config("format: xml\n").is_err());
        assert!(parse_config("pattern_dirs: 3\n").is_err());
        assert!(parse_config("- a\n- b\n").is_err());
    }

    #[test]
    fn parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "max_depth: [unclosed\n");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE));
    }
}
