//! Running compiled patterns against input lines.
//!
//! Matching is read-only with respect to a [`CompiledPattern`], so batches are
//! spread over the rayon pool. A [`CancelToken`] is checked before each line;
//! a cancelled batch returns the contiguous prefix of lines that finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use super::cast::{cast, CastError, FieldValue};
use super::compiler::CompiledPattern;

/// Field values of one matched line, in compiled field order.
pub type FieldMap = IndexMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub line: String,
    /// Fields whose group took part in the match. Absent fields did not.
    pub values: FieldMap,
}

/// What to do when a captured value does not parse as its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CastPolicy {
    /// Keep the raw string for that field and carry on.
    #[default]
    Lenient,
    /// Reject the whole line.
    Strict,
}

#[derive(Debug, Clone, Error)]
pub enum MatchError {
    #[error("regex engine error: {message}")]
    Engine { message: String },
    #[error("field `{field}`: {source}")]
    Cast { field: String, source: CastError },
}

/// Cooperative cancellation flag shared between a caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub enum LineOutcome {
    Matched(MatchResult),
    Unmatched,
    Failed(MatchError),
}

impl LineOutcome {
    pub fn into_match(self) -> Option<MatchResult> {
        match self {
            LineOutcome::Matched(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// One outcome per input line, in input order, up to the cancellation point.
    pub outcomes: Vec<LineOutcome>,
    pub cancelled: bool,
}

pub struct Matcher<'p> {
    pattern: &'p CompiledPattern,
    policy: CastPolicy,
}

impl<'p> Matcher<'p> {
    pub fn new(pattern: &'p CompiledPattern) -> Self {
        Self {
            pattern,
            policy: CastPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CastPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Match one line. `Ok(None)` is an ordinary non-match.
    pub fn try_match(&self, line: &str) -> Result<Option<MatchResult>, MatchError> {
        let captures = self
            .pattern
            .field_captures(line)
            .map_err(|e| MatchError::Engine {
                message: e.to_string(),
            })?;
        let Some(captures) = captures else {
            return Ok(None);
        };

        let mut values = FieldMap::with_capacity(captures.len());
        for (field, raw) in self.pattern.fields().iter().zip(captures) {
            let Some(raw) = raw else { continue };
            // Repeated labels: the first participating group wins.
            if values.contains_key(&field.name) {
                continue;
            }
            let value = match cast(raw, field.semantic_type) {
                Ok(v) => v,
                Err(e) => match self.policy {
                    CastPolicy::Lenient => {
                        tracing::trace!(field = %field.name, "{e}; keeping raw text");
                        FieldValue::Str(raw.to_string())
                    }
                    CastPolicy::Strict => {
                        return Err(MatchError::Cast {
                            field: field.name.clone(),
                            source: e,
                        });
                    }
                },
            };
            values.insert(field.name.clone(), value);
        }

        Ok(Some(MatchResult {
            line: line.to_string(),
            values,
        }))
    }

    /// Match one line, folding engine and strict-cast failures into "no match".
    pub fn match_line(&self, line: &str) -> Option<MatchResult> {
        match self.try_match(line) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("line rejected: {e}");
                None
            }
        }
    }

    pub fn outcome(&self, line: &str) -> LineOutcome {
        match self.try_match(line) {
            Ok(Some(m)) => LineOutcome::Matched(m),
            Ok(None) => LineOutcome::Unmatched,
            Err(e) => LineOutcome::Failed(e),
        }
    }

    /// Match every line in parallel, stopping early once `cancel` trips.
    pub fn match_lines<S>(&self, lines: &[S], cancel: &CancelToken) -> BatchOutcome
    where
        S: AsRef<str> + Sync,
    {
        self.match_lines_with_progress(lines, cancel, |_| {})
    }

    /// Like [`match_lines`](Self::match_lines), calling `on_line` with the
    /// index of each line once its outcome is known.
    pub fn match_lines_with_progress<S, F>(
        &self,
        lines: &[S],
        cancel: &CancelToken,
        on_line: F,
    ) -> BatchOutcome
    where
        S: AsRef<str> + Sync,
        F: Fn(usize) + Sync,
    {
        let mut slots: Vec<Option<LineOutcome>> = lines
            .par_iter()
            .enumerate()
            .map(|(idx, line)| {
                if cancel.is_cancelled() {
                    return None;
                }
                let outcome = self.outcome(line.as_ref());
                on_line(idx);
                Some(outcome)
            })
            .collect();

        let completed = slots.iter().position(Option::is_none).unwrap_or(slots.len());
        let cancelled = completed < lines.len();
        slots.truncate(completed);
        if cancelled {
            tracing::debug!(completed, total = lines.len(), "batch cancelled");
        }

        BatchOutcome {
            outcomes: slots.into_iter().flatten().collect(),
            cancelled,
        }
    }
}

/// Match one line with the default (lenient) cast policy.
pub fn match_line(pattern: &CompiledPattern, line: &str) -> Option<MatchResult> {
    Matcher::new(pattern).match_line(line)
}
