//! Grok pattern compilation and matching.
//!
//! A grok pattern is regex text with `%{NAME[:FIELD[:TYPE]]}` references to
//! named definitions held in a [`Registry`]. The [`Compiler`] expands the
//! references into a single regex and records which capture groups become
//! output fields; the [`Matcher`] runs the result against lines and casts
//! each captured value to its declared type.

pub mod cast;
pub mod compiler;
pub mod lexer;
pub mod library;
pub mod matcher;
pub mod registry;

pub use cast::{cast, CastError, FieldValue, SemanticType};
pub use compiler::{
    compile, CompileError, CompiledField, CompiledPattern, Compiler, EngineKind,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_EXPANDED_LEN,
};
pub use lexer::{PatternReference, Token};
pub use matcher::{
    match_line, BatchOutcome, CancelToken, CastPolicy, FieldMap, LineOutcome, MatchError,
    MatchResult, Matcher,
};
pub use registry::{DefinitionError, Origin, PatternDefinition, Registry};
