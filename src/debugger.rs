//! One debug action: compile a pattern, run it over the input, tabulate.
//!
//! Nothing is kept between calls. Each call compiles afresh against the
//! registry it is given.

use crate::grok::{
    BatchOutcome, CancelToken, CastPolicy, CompileError, Compiler, LineOutcome, MatchError, Matcher, Registry,
    DEFAULT_MAX_DEPTH,
};
use crate::table::{ResultTable, TableBuilder};

#[derive(Debug, Clone, Copy)]
pub struct DebugOptions {
    pub max_depth: usize,
    pub cast_policy: CastPolicy,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            cast_policy: CastPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct DebugReport {
    pub table: ResultTable,
    pub expanded_regex: String,
    /// Lines processed before the run finished or was cancelled.
    pub line_count: usize,
    pub unmatched: usize,
    /// Lines rejected by the engine or by a strict cast, 1-indexed.
    pub errors: Vec<(usize, MatchError)>,
    pub cancelled: bool,
}

impl DebugReport {
    pub fn matched(&self) -> usize {
        self.table.matched
    }
}

pub fn debug<S>(
    registry: &Registry,
    options: &DebugOptions,
    pattern_text: &str,
    lines: &[S],
    cancel: &CancelToken,
) -> Result<DebugReport, CompileError>
where
    S: AsRef<str> + Sync,
{
    debug_with_progress(registry, options, pattern_text, lines, cancel, |_| {})
}

/// [`debug`] with a callback receiving the index of each line once it has
/// been matched. The callback may cancel the run through `cancel`.
pub fn debug_with_progress<S, F>(
    registry: &Registry,
    options: &DebugOptions,
    pattern_text: &str,
    lines: &[S],
    cancel: &CancelToken,
    on_line: F,
) -> Result<DebugReport, CompileError>
where
    S: AsRef<str> + Sync,
    F: Fn(usize) + Sync,
{
    let compiled = Compiler::new(registry)
        .with_max_depth(options.max_depth)
        .compile(pattern_text)?;
    tracing::debug!(
        engine = %compiled.engine_kind(),
        fields = compiled.fields().len(),
        lines = lines.len(),
        "pattern compiled"
    );

    let batch = Matcher::new(&compiled)
        .with_policy(options.cast_policy)
        .match_lines_with_progress(lines, cancel, on_line);

    Ok(summarize(batch, compiled.expanded_regex().to_string()))
}

/// Tabulate the outcomes of a batch, which may be a cancelled prefix.
fn summarize(batch: BatchOutcome, expanded_regex: String) -> DebugReport {
    let line_count = batch.outcomes.len();
    let mut builder = TableBuilder::new();
    let mut errors = Vec::new();
    for (idx, outcome) in batch.outcomes.into_iter().enumerate() {
        match outcome {
            LineOutcome::Matched(m) => builder.push(Some(m)),
            LineOutcome::Unmatched => builder.push(None),
            LineOutcome::Failed(e) => {
                builder.push(None);
                errors.push((idx + 1, e));
            }
        }
    }
    let table = builder.finish();

    DebugReport {
        unmatched: table.unmatched,
        table,
        expanded_regex,
        line_count,
        errors,
        cancelled: batch.cancelled,
    }
}
