use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::grok::{Origin, Registry};

/// Load every pattern-set file under `paths` into `registry` as user
/// definitions. Each regular file is one set named after the file. Hidden
/// and git-ignored files are skipped. Returns the number of definitions
/// loaded.
pub fn load_pattern_dirs(registry: &mut Registry, paths: &[PathBuf]) -> Result<usize> {
    let mut total = 0;
    for file in discover_pattern_files(paths)? {
        let set = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let source = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read pattern file {}", file.display()))?;
        let count = registry
            .load_definitions(&set, &source, Origin::User)
            .with_context(|| format!("invalid pattern file {}", file.display()))?;
        tracing::debug!(set, count, path = %file.display(), "loaded user patterns");
        total += count;
    }
    Ok(total)
}

/// Pattern files under the given paths, in path order. Files passed
/// directly are taken as-is.
pub fn discover_pattern_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut dir_files = walk_directory(path)?;
            dir_files.sort();
            files.extend(dir_files);
        } else {
            anyhow::bail!("pattern path does not exist: {}", path.display());
        }
    }

    Ok(files)
}

fn walk_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(dir);
    builder.hidden(true).git_ignore(true).git_global(true);

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.context("error walking directory")?;
        if entry.file_type().is_some_and(|t| t.is_file()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    // Walks skip hidden entries, so avoid the default `.tmp` prefix.
    fn scratch() -> tempfile::TempDir {
        tempfile::Builder::new()
            .prefix("grokdebug-fs")
            .tempdir()
            .unwrap()
    }

    #[test]
    fn loads_every_file_in_directory() {
        let dir = scratch();
        fs::write(dir.path().join("app"), "APPID [A-Z]{3}-\\d+\n").unwrap();
        fs::write(dir.path().join("more"), "# comment\nREQ %{APPID:id} %{WORD:op}\n").unwrap();

        let mut reg = Registry::with_builtins();
        let count = load_pattern_dirs(&mut reg, &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(count, 2);
        let def = reg.lookup("REQ").unwrap();
        assert_eq!(def.origin, Origin::User);
        assert_eq!(def.set.as_deref(), Some("more"));
        assert_eq!(reg.set_origin("app"), Some(Origin::User));
    }

    #[test]
    fn hidden_files_are_skipped() {
        let dir = scratch();
        fs::write(dir.path().join(".hidden"), "SECRET x\n").unwrap();
        fs::write(dir.path().join("visible"), "SHOWN y\n").unwrap();

        let mut reg = Registry::new();
        load_pattern_dirs(&mut reg, &[dir.path().to_path_buf()]).unwrap();
        assert!(reg.contains("SHOWN"));
        assert!(!reg.contains("SECRET"));
    }

    #[test]
    fn nested_directories_are_walked_in_order() {
        let dir = scratch();
        let sub = dir.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(dir.path().join("b"), "").unwrap();
        fs::write(sub.join("a"), "").unwrap();
        fs::write(dir.path().join("a"), "").unwrap();

        let files = discover_pattern_files(&[dir.path().to_path_buf()]).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("sub/a")]
        );
    }

    #[test]
    fn user_definitions_shadow_builtins() {
        let dir = scratch();
        let file = dir.path().join("override");
        fs::write(&file, "WORD [a-z]+\n").unwrap();

        let mut reg = Registry::with_builtins();
        load_pattern_dirs(&mut reg, &[file]).unwrap();
        let def = reg.lookup("WORD").unwrap();
        assert_eq!(def.body, "[a-z]+");
        assert_eq!(def.origin, Origin::User);
    }

    #[test]
    fn malformed_file_names_path() {
        let dir = scratch();
        let file = dir.path().join("broken");
        fs::write(&file, "GOOD a\nBAD-NAME b\n").unwrap();

        let mut reg = Registry::new();
        let err = load_pattern_dirs(&mut reg, &[file]).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("broken"));
        assert!(msg.contains("broken:2"));
        assert!(!reg.contains("GOOD"));
    }

    #[test]
    fn nonexistent_path_errors() {
        let mut reg = Registry::new();
        let result = load_pattern_dirs(&mut reg, &[PathBuf::from("/no/such/path")]);
        assert!(result.is_err());
    }
}
