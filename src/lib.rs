pub mod cli;
pub mod config;
pub mod debugger;
pub mod formatter;
pub mod fs;
pub mod grok;
pub mod store;
pub mod table;

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use cli::Args;
use config::{load_config, GrokConfig};
use debugger::{debug, DebugOptions};
use formatter::{create_formatter, export_csv};
use fs::load_pattern_dirs;
use grok::{CancelToken, CastPolicy, CompileError, Compiler, Origin, Registry, DEFAULT_MAX_DEPTH};
use store::{default_library_path, JsonFileStore, PatternStore};

static TRACING_INIT: Once = Once::new();

/// Install the stderr log subscriber. `RUST_LOG` wins when set; otherwise
/// `--debug` turns on this crate's debug events and warnings show by default.
pub fn init_tracing(debug: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if debug {
            EnvFilter::new("grokdebug=debug")
        } else {
            EnvFilter::new("grokdebug=warn")
        };
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .try_init();
    });
}

/// Run one command. Returns the exit code: 0 = matched (or the requested
/// action succeeded), 1 = no line matched, 2 = the pattern did not compile.
pub fn run(args: Args) -> Result<i32> {
    let config = load_config(args.config.as_deref())?;
    if let Some(dir) = config.config_dir() {
        tracing::debug!("config loaded from: {}", dir.display());
    }

    // --list-saved / --delete: library management, no pattern needed
    if args.list_saved {
        let store = open_store(&args, &config)?;
        for title in store.list()? {
            println!("{title}");
        }
        return Ok(0);
    }
    if let Some(title) = &args.delete {
        let store = open_store(&args, &config)?;
        store.delete(title)?;
        eprintln!("deleted `{title}` from {}", store.path().display());
        return Ok(0);
    }

    let registry = build_registry(&args, &config)?;

    if args.list_sets {
        for set in registry.sets() {
            let origin = match registry.set_origin(set) {
                Some(Origin::User) => "user",
                _ => "builtin",
            };
            println!("{set} ({origin})");
        }
        return Ok(0);
    }
    if let Some(set) = &args.show_set {
        let Some(source) = registry.set_source(set) else {
            bail!("unknown pattern set `{set}` (see --list-sets)");
        };
        print!("{source}");
        if !source.ends_with('\n') {
            println!();
        }
        return Ok(0);
    }
    if args.list_patterns {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(0);
    }
    if let Some(name) = &args.show_pattern {
        let Some(def) = registry.lookup(name) else {
            bail!("unknown pattern `{name}` (see --list-patterns)");
        };
        println!("{} {}", def.name, def.body);
        return Ok(0);
    }

    let pattern_text = match (&args.pattern, &args.pattern_title) {
        (Some(text), _) => text.clone(),
        (None, Some(title)) => open_store(&args, &config)?.get(title)?,
        (None, None) => bail!("no pattern given (use --pattern or --pattern-title)"),
    };

    let options = DebugOptions {
        max_depth: args
            .max_depth
            .map(|n| n as usize)
            .or(config.max_depth())
            .unwrap_or(DEFAULT_MAX_DEPTH),
        cast_policy: if args.strict_casts {
            CastPolicy::Strict
        } else {
            config.cast_policy().unwrap_or_default()
        },
    };

    if args.expand {
        let compiled = match Compiler::new(&registry)
            .with_max_depth(options.max_depth)
            .compile(&pattern_text)
        {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", render_compile_error(&e, &pattern_text));
                return Ok(2);
            }
        };
        println!("{}", compiled.expanded_regex());
        for field in compiled.fields() {
            println!("  {} ({})", field.name, field.semantic_type);
        }
        tracing::debug!(engine = %compiled.engine_kind(), "expanded pattern");
        return Ok(0);
    }

    if let Some(title) = &args.save {
        let store = open_store(&args, &config)?;
        store.save(title, &pattern_text)?;
        eprintln!("saved `{title}` to {}", store.path().display());
        if args.inputs.is_empty() {
            return Ok(0);
        }
    }

    let lines = read_inputs(&args.inputs)?;
    let cancel = CancelToken::new();
    if let Some(ms) = args.timeout_ms {
        arm_timeout(cancel.clone(), Duration::from_millis(ms));
    }

    let report = match debug(&registry, &options, &pattern_text, &lines, &cancel) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", render_compile_error(&e, &pattern_text));
            return Ok(2);
        }
    };
    tracing::debug!(regex = %report.expanded_regex, "matched with");

    for (line_no, err) in &report.errors {
        tracing::warn!("line {line_no}: {err}");
    }
    if report.cancelled {
        eprintln!(
            "warning: stopped after {} of {} lines (timeout)",
            report.line_count,
            lines.len()
        );
    }

    let format = output_format(&args, &config);
    match &args.output {
        Some(path) if format == "csv" => export_csv(&report.table, path)?,
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            create_formatter(format)
                .format_to(&report.table, &mut out)
                .and_then(|()| out.flush())
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => create_formatter(format)
            .print(&report.table)
            .context("failed to write output")?,
    }

    Ok(if report.matched() > 0 { 0 } else { 1 })
}

fn build_registry(args: &Args, config: &GrokConfig) -> Result<Registry> {
    let mut registry = Registry::with_builtins();
    let dirs: Vec<PathBuf> = config
        .pattern_dirs()
        .iter()
        .chain(&args.patterns_dirs)
        .cloned()
        .collect();
    if !dirs.is_empty() {
        let count = load_pattern_dirs(&mut registry, &dirs)?;
        tracing::debug!(count, dirs = dirs.len(), "loaded user pattern definitions");
    }
    Ok(registry)
}

fn open_store(args: &Args, config: &GrokConfig) -> Result<JsonFileStore> {
    let path = args
        .library
        .clone()
        .or_else(|| config.library().map(Path::to_path_buf))
        .or_else(default_library_path)
        .context("no pattern library location; pass --library or set GROKDEBUG_LIBRARY")?;
    Ok(JsonFileStore::open(path)?)
}

fn output_format<'a>(args: &'a Args, config: &'a GrokConfig) -> &'a str {
    if let Some(format) = args.format.as_deref().or(config.format()) {
        return format;
    }
    let csv_output = args
        .output
        .as_deref()
        .and_then(Path::extension)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if csv_output { "csv" } else { "table" }
}

/// Read every input as text lines. No inputs, or `-`, means stdin.
///
/// Invalid UTF-8 is replaced with U+FFFD so one bad line cannot sink the run.
fn read_inputs(inputs: &[PathBuf]) -> Result<Vec<String>> {
    let mut text = String::new();
    if inputs.is_empty() {
        push_decoded(&mut text, &read_stdin()?, "stdin");
    }
    for input in inputs {
        if input.as_os_str() == "-" {
            push_decoded(&mut text, &read_stdin()?, "stdin");
        } else {
            let bytes = std::fs::read(input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            push_decoded(&mut text, &bytes, &input.display().to_string());
        }
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
    }
    Ok(text.lines().map(str::to_string).collect())
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    std::io::stdin()
        .read_to_end(&mut bytes)
        .context("failed to read stdin")?;
    Ok(bytes)
}

fn push_decoded(text: &mut String, bytes: &[u8], source: &str) {
    let decoded = String::from_utf8_lossy(bytes);
    if let std::borrow::Cow::Owned(_) = decoded {
        tracing::warn!("{source}: invalid UTF-8 replaced with U+FFFD");
    }
    text.push_str(&decoded);
}

fn arm_timeout(cancel: CancelToken, after: Duration) {
    std::thread::spawn(move || {
        std::thread::sleep(after);
        cancel.cancel();
    });
}

/// Format a compile error for the terminal, with a caret under the
/// offending position when it points into `source`.
pub fn render_compile_error(err: &CompileError, source: &str) -> String {
    let mut out = format!("error: {err}");
    let Some(pos) = err.source_position() else {
        return out;
    };
    let Some(before) = source.get(..pos) else {
        return out;
    };
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[pos..].find('\n').map_or(source.len(), |i| pos + i);
    let column = source[line_start..pos].chars().count();
    out.push_str(&format!(
        "\n  {}\n  {}^",
        &source[line_start..line_end],
        " ".repeat(column)
    ));
    out
}
