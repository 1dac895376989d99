//! Grok pattern compiler.
//!
//! Expands `%{NAME[:FIELD[:TYPE]]}` references against a [`Registry`] into a
//! single regex and an ordered field list. Expansion walks an explicit work
//! stack instead of recursing, so cyclic or absurdly deep definitions end in
//! a typed error rather than a stack overflow.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use super::cast::SemanticType;
use super::lexer::{tokenize, LexError, Token};
use super::registry::Registry;

/// Maximum nesting of pattern references along one expansion path.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Maximum length in bytes of an expanded regex. Reference fan-out can grow
/// the expansion exponentially without ever nesting deeply.
pub const DEFAULT_MAX_EXPANDED_LEN: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error in {} at byte {position}: {message}", site(.pattern))]
    Syntax {
        position: usize,
        message: String,
        /// Definition whose body was being lexed; `None` for the pattern text itself.
        pattern: Option<String>,
    },
    #[error("unknown pattern `{name}` referenced in {}", site(.pattern))]
    UnknownPattern {
        name: String,
        position: usize,
        pattern: Option<String>,
    },
    #[error("cyclic reference to `{name}`: {}", .chain.join(" -> "))]
    CyclicReference { name: String, chain: Vec<String> },
    #[error("pattern expansion exceeds {limit} levels at `{name}`")]
    ExpansionTooDeep { limit: usize, name: String },
    #[error("expanded pattern exceeds {limit} bytes while expanding {}", site(.pattern))]
    ExpansionTooLarge {
        limit: usize,
        /// Definition being expanded when the limit was hit.
        pattern: Option<String>,
    },
    #[error("expanded pattern is not a valid regex: {message}")]
    InvalidRegex { message: String },
}

fn site(pattern: &Option<String>) -> String {
    match pattern {
        Some(name) => format!("definition of `{name}`"),
        None => "pattern".to_string(),
    }
}

impl CompileError {
    /// Byte offset into the source text, when the error points at it.
    pub fn source_position(&self) -> Option<usize> {
        match self {
            CompileError::Syntax {
                position,
                pattern: None,
                ..
            }
            | CompileError::UnknownPattern {
                position,
                pattern: None,
                ..
            } => Some(*position),
            _ => None,
        }
    }

    fn syntax(err: LexError, pattern: Option<&str>) -> Self {
        CompileError::Syntax {
            position: err.position,
            message: err.message,
            pattern: pattern.map(str::to_string),
        }
    }
}

/// A labelled capture in a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledField {
    pub name: String,
    pub semantic_type: SemanticType,
    /// Synthetic group name used in the expanded regex.
    group: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Linear-time `regex` crate.
    Standard,
    /// Backtracking `fancy-regex`, needed for look-around and atomic groups.
    Backtracking,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Standard => f.write_str("standard"),
            EngineKind::Backtracking => f.write_str("backtracking"),
        }
    }
}

#[derive(Debug, Clone)]
enum Engine {
    Standard(regex::Regex),
    Backtracking(fancy_regex::Regex),
}

impl Engine {
    fn build(expanded: &str) -> Result<Engine, CompileError> {
        if let Ok(re) = regex::Regex::new(expanded) {
            return Ok(Engine::Standard(re));
        }
        fancy_regex::Regex::new(expanded)
            .map(Engine::Backtracking)
            .map_err(|e| CompileError::InvalidRegex {
                message: e.to_string(),
            })
    }
}

/// Frozen result of compiling pattern text. Holds no reference to the
/// registry; later registry changes never affect it.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source_text: String,
    expanded_regex: String,
    fields: Vec<CompiledField>,
    engine: Engine,
}

impl CompiledPattern {
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn expanded_regex(&self) -> &str {
        &self.expanded_regex
    }

    /// Declared fields in depth-first textual order. A label may repeat.
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    /// Distinct field names in first-declared order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn engine_kind(&self) -> EngineKind {
        match self.engine {
            Engine::Standard(_) => EngineKind::Standard,
            Engine::Backtracking(_) => EngineKind::Backtracking,
        }
    }

    /// Run the regex against `line` and return, per declared field, the text
    /// of its group (`None` when the group did not participate). `Ok(None)`
    /// means the line did not match.
    pub(crate) fn field_captures<'t>(
        &self,
        line: &'t str,
    ) -> Result<Option<Vec<Option<&'t str>>>, fancy_regex::Error> {
        match &self.engine {
            Engine::Standard(re) => Ok(re.captures(line).map(|caps| {
                self.fields
                    .iter()
                    .map(|f| caps.name(&f.group).map(|m| m.as_str()))
                    .collect()
            })),
            Engine::Backtracking(re) => Ok(re.captures(line)?.map(|caps| {
                self.fields
                    .iter()
                    .map(|f| caps.name(&f.group).map(|m| m.as_str()))
                    .collect()
            })),
        }
    }
}

struct Frame {
    /// `None` for the top-level pattern text.
    name: Option<String>,
    tokens: std::vec::IntoIter<Token>,
}

pub struct Compiler<'r> {
    registry: &'r Registry,
    max_depth: usize,
    max_expanded_len: usize,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
            max_expanded_len: DEFAULT_MAX_EXPANDED_LEN,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_expanded_len(mut self, max_expanded_len: usize) -> Self {
        self.max_expanded_len = max_expanded_len;
        self
    }

    pub fn compile(&self, source: &str) -> Result<CompiledPattern, CompileError> {
        let root = tokenize(source).map_err(|e| CompileError::syntax(e, None))?;

        let mut out = String::with_capacity(source.len() * 4);
        let mut fields = Vec::new();
        let mut on_path: HashSet<String> = HashSet::new();
        let mut bodies: HashMap<String, Vec<Token>> = HashMap::new();
        let mut stack = vec![Frame {
            name: None,
            tokens: root.into_iter(),
        }];

        while let Some(frame) = stack.last_mut() {
            // Each step appends at most one token, so this bounds the output.
            if out.len() > self.max_expanded_len {
                return Err(CompileError::ExpansionTooLarge {
                    limit: self.max_expanded_len,
                    pattern: frame.name.clone(),
                });
            }
            let Some(token) = frame.tokens.next() else {
                if let Some(Frame {
                    name: Some(name), ..
                }) = stack.pop()
                {
                    on_path.remove(&name);
                    out.push(')');
                }
                continue;
            };

            let reference = match token {
                Token::Literal(text) => {
                    out.push_str(&text);
                    continue;
                }
                Token::Reference(r) => r,
            };
            let enclosing = stack.last().and_then(|f| f.name.clone());

            if on_path.contains(&reference.name) {
                let mut chain: Vec<String> = stack.iter().filter_map(|f| f.name.clone()).collect();
                chain.push(reference.name.clone());
                return Err(CompileError::CyclicReference {
                    name: reference.name,
                    chain,
                });
            }

            let Some(definition) = self.registry.lookup(&reference.name) else {
                return Err(CompileError::UnknownPattern {
                    name: reference.name,
                    position: reference.span.start,
                    pattern: enclosing,
                });
            };

            if stack.len() > self.max_depth {
                // A cycle longer than the depth bound still reports as a cycle.
                if let Some(chain) = self.find_cycle(&reference.name) {
                    return Err(CompileError::CyclicReference {
                        name: chain.last().cloned().unwrap_or_default(),
                        chain,
                    });
                }
                return Err(CompileError::ExpansionTooDeep {
                    limit: self.max_depth,
                    name: reference.name,
                });
            }

            let tokens = match bodies.get(&reference.name) {
                Some(tokens) => tokens.clone(),
                None => {
                    let tokens = tokenize(&definition.body)
                        .map_err(|e| CompileError::syntax(e, Some(&reference.name)))?;
                    bodies.insert(reference.name.clone(), tokens.clone());
                    tokens
                }
            };

            match reference.field {
                Some(field) => {
                    let group = format!("__g{}", fields.len());
                    out.push_str("(?P<");
                    out.push_str(&group);
                    out.push('>');
                    fields.push(CompiledField {
                        name: field,
                        semantic_type: reference.semantic_type.unwrap_or_default(),
                        group,
                    });
                }
                None => out.push_str("(?:"),
            }

            on_path.insert(reference.name.clone());
            stack.push(Frame {
                name: Some(reference.name),
                tokens: tokens.into_iter(),
            });
        }

        if out.len() > self.max_expanded_len {
            return Err(CompileError::ExpansionTooLarge {
                limit: self.max_expanded_len,
                pattern: None,
            });
        }
        let engine = Engine::build(&out)?;
        let compiled = CompiledPattern {
            source_text: source.to_string(),
            expanded_regex: out,
            fields,
            engine,
        };
        tracing::debug!(
            fields = compiled.fields.len(),
            regex_len = compiled.expanded_regex.len(),
            engine = %compiled.engine_kind(),
            "compiled pattern"
        );
        Ok(compiled)
    }

    /// Iterative DFS over the reference graph reachable from `start`. Returns
    /// the first cycle found as a chain ending with its repeated name.
    fn find_cycle(&self, start: &str) -> Option<Vec<String>> {
        let mut done: HashSet<String> = HashSet::new();
        let mut path: Vec<(String, std::vec::IntoIter<String>)> = Vec::new();
        let mut on_path: HashSet<String> = HashSet::new();

        path.push((start.to_string(), self.referenced_names(start).into_iter()));
        on_path.insert(start.to_string());

        while let Some((_, children)) = path.last_mut() {
            match children.next() {
                Some(child) if on_path.contains(&child) => {
                    let from = path.iter().position(|(n, _)| *n == child).unwrap_or(0);
                    let mut chain: Vec<String> = path[from..].iter().map(|(n, _)| n.clone()).collect();
                    chain.push(child);
                    return Some(chain);
                }
                Some(child) if done.contains(&child) => {}
                Some(child) => {
                    let grandchildren = self.referenced_names(&child).into_iter();
                    on_path.insert(child.clone());
                    path.push((child, grandchildren));
                }
                None => {
                    if let Some((name, _)) = path.pop() {
                        on_path.remove(&name);
                        done.insert(name);
                    }
                }
            }
        }
        None
    }

    fn referenced_names(&self, name: &str) -> Vec<String> {
        let Some(def) = self.registry.lookup(name) else {
            return Vec::new();
        };
        tokenize(&def.body)
            .map(|tokens| {
                tokens
                    .into_iter()
                    .filter_map(|t| match t {
                        Token::Reference(r) if self.registry.contains(&r.name) => Some(r.name),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Compile `source` against `registry` with the default depth limit.
pub fn compile(registry: &Registry, source: &str) -> Result<CompiledPattern, CompileError> {
    Compiler::new(registry).compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grok::registry::Origin;

    fn registry(defs: &[(&str, &str)]) -> Registry {
        let mut reg = Registry::new();
        for (name, body) in defs {
            reg.register(*name, *body, Origin::User);
        }
        reg
    }

    fn field_summary(p: &CompiledPattern) -> Vec<(&str, SemanticType)> {
        p.fields()
            .iter()
            .map(|f| (f.name.as_str(), f.semantic_type))
            .collect()
    }

    #[test]
    fn literal_only_pattern() {
        let reg = Registry::new();
        let p = compile(&reg, r"^\d+$").unwrap();
        assert_eq!(p.expanded_regex(), r"^\d+$");
        assert!(p.fields().is_empty());
        assert_eq!(p.engine_kind(), EngineKind::Standard);
    }

    #[test]
    fn unlabelled_reference_is_non_capturing() {
        let reg = registry(&[("NUM", r"\d+")]);
        let p = compile(&reg, "a%{NUM}b").unwrap();
        assert_eq!(p.expanded_regex(), r"a(?:\d+)b");
        assert!(p.fields().is_empty());
    }

    #[test]
    fn labelled_reference_adds_field() {
        let reg = registry(&[("NUM", r"\d+")]);
        let p = compile(&reg, "%{NUM:count:int}").unwrap();
        assert_eq!(p.expanded_regex(), r"(?P<__g0>\d+)");
        assert_eq!(field_summary(&p), vec![("count", SemanticType::Int)]);
    }

    #[test]
    fn fields_follow_depth_first_order() {
        let reg = registry(&[
            ("INNER", r"%{NUM:inner}"),
            ("NUM", r"\d+"),
            ("OUTER", r"%{INNER:outer}-%{NUM:tail:float}"),
        ]);
        let p = compile(&reg, "%{NUM:head} %{OUTER:whole}").unwrap();
        assert_eq!(
            field_summary(&p),
            vec![
                ("head", SemanticType::String),
                ("whole", SemanticType::String),
                ("outer", SemanticType::String),
                ("inner", SemanticType::String),
                ("tail", SemanticType::Float),
            ]
        );
        assert_eq!(
            p.expanded_regex(),
            r"(?P<__g0>\d+) (?P<__g1>(?P<__g2>(?P<__g3>\d+))-(?P<__g4>\d+))"
        );
    }

    #[test]
    fn alternation_in_body_stays_grouped() {
        let reg = registry(&[("AB", "a|b")]);
        let p = compile(&reg, "x%{AB}y").unwrap();
        assert_eq!(p.expanded_regex(), "x(?:a|b)y");
    }

    #[test]
    fn sibling_reuse_is_not_a_cycle() {
        let reg = registry(&[("W", r"\w+"), ("PAIR", "%{W}=%{W}")]);
        let p = compile(&reg, "%{PAIR} %{PAIR}").unwrap();
        assert_eq!(p.expanded_regex(), r"(?:(?:\w+)=(?:\w+)) (?:(?:\w+)=(?:\w+))");
    }

    #[test]
    fn duplicate_labels_get_distinct_groups() {
        let reg = registry(&[("W", r"\w+")]);
        let p = compile(&reg, "%{W:x} %{W:x}").unwrap();
        assert_eq!(p.fields().len(), 2);
        assert_eq!(p.field_names(), vec!["x"]);
    }

    #[test]
    fn unknown_reference() {
        let reg = registry(&[("A", "a")]);
        let err = compile(&reg, "%{A} %{MISSING}").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownPattern {
                name: "MISSING".into(),
                position: 5,
                pattern: None,
            }
        );
        assert_eq!(err.source_position(), Some(5));
    }

    #[test]
    fn unknown_reference_inside_definition() {
        let reg = registry(&[("A", "x%{GONE}")]);
        let err = compile(&reg, "%{A}").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownPattern {
                name: "GONE".into(),
                position: 1,
                pattern: Some("A".into()),
            }
        );
        assert_eq!(err.source_position(), None);
        assert_eq!(err.to_string(), "unknown pattern `GONE` referenced in definition of `A`");
    }

    #[test]
    fn unterminated_reference_is_syntax_error() {
        let reg = Registry::new();
        let err = compile(&reg, "%{FOO").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Syntax {
                position: 0,
                pattern: None,
                ..
            }
        ));
    }

    #[test]
    fn syntax_error_in_definition_body() {
        let reg = registry(&[("BAD", "%{OOPS")]);
        let err = compile(&reg, "ok %{BAD}").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Syntax { pattern: Some(ref p), .. } if p == "BAD"
        ));
    }

    #[test]
    fn self_reference_is_cycle() {
        let reg = registry(&[("A", "%{A}")]);
        let err = compile(&reg, "%{A}").unwrap_err();
        assert_eq!(
            err,
            CompileError::CyclicReference {
                name: "A".into(),
                chain: vec!["A".into(), "A".into()],
            }
        );
    }

    #[test]
    fn mutual_reference_is_cycle() {
        let reg = registry(&[("A", "a%{B}"), ("B", "b%{C}"), ("C", "c%{A}")]);
        let err = compile(&reg, "%{A}").unwrap_err();
        assert_eq!(err.to_string(), "cyclic reference to `A`: A -> B -> C -> A");
    }

    #[test]
    fn cycle_longer_than_depth_limit_is_still_a_cycle() {
        let n = 200;
        let defs: Vec<(String, String)> = (0..n)
            .map(|i| (format!("P{i}"), format!("%{{P{}}}", (i + 1) % n)))
            .collect();
        let mut reg = Registry::new();
        for (name, body) in &defs {
            reg.register(name.as_str(), body.as_str(), Origin::User);
        }
        let err = compile(&reg, "%{P0}").unwrap_err();
        match err {
            CompileError::CyclicReference { chain, .. } => {
                assert_eq!(chain.first(), chain.last());
                assert_eq!(chain.len(), n + 1);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn deep_chain_exceeds_limit() {
        let n = 80;
        let mut reg = Registry::new();
        for i in 0..n {
            reg.register(format!("D{i}"), format!("%{{D{}}}", i + 1), Origin::User);
        }
        reg.register(format!("D{n}"), "end", Origin::User);
        let err = compile(&reg, "%{D0}").unwrap_err();
        assert!(matches!(
            err,
            CompileError::ExpansionTooDeep { limit: DEFAULT_MAX_DEPTH, .. }
        ));

        let p = Compiler::new(&reg).with_max_depth(100).compile("%{D0}").unwrap();
        assert!(p.expanded_regex().contains("end"));
    }

    #[test]
    fn depth_limit_is_inclusive() {
        let mut reg = Registry::new();
        for i in 0..3 {
            reg.register(format!("D{i}"), format!("%{{D{}}}", i + 1), Origin::User);
        }
        reg.register("D3", "x", Origin::User);
        // %{D0} -> D1 -> D2 -> D3: four nested references.
        assert!(Compiler::new(&reg).with_max_depth(4).compile("%{D0}").is_ok());
        assert!(matches!(
            Compiler::new(&reg).with_max_depth(3).compile("%{D0}"),
            Err(CompileError::ExpansionTooDeep { limit: 3, .. })
        ));
    }

    #[test]
    fn fan_out_expansion_is_bounded() {
        // Each level references the next twice: 2^40 copies of the leaf.
        let n = 40;
        let mut reg = Registry::new();
        for i in 0..n {
            reg.register(format!("F{i}"), format!("%{{F{0}}}%{{F{0}}}", i + 1), Origin::User);
        }
        reg.register(format!("F{n}"), "x", Origin::User);

        let started = std::time::Instant::now();
        let err = compile(&reg, "%{F0}").unwrap_err();
        assert!(
            matches!(
                err,
                CompileError::ExpansionTooLarge { limit: DEFAULT_MAX_EXPANDED_LEN, pattern: Some(_) }
            ),
            "got {err:?}"
        );
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn expanded_len_limit_is_configurable() {
        let reg = registry(&[("A", "aaaaaaaaaa"), ("B", "%{A}%{A}%{A}")]);
        let p = Compiler::new(&reg).with_max_expanded_len(100).compile("%{B}").unwrap();
        assert!(p.expanded_regex().len() <= 100);

        let err = Compiler::new(&reg)
            .with_max_expanded_len(20)
            .compile("%{B}")
            .unwrap_err();
        assert!(matches!(err, CompileError::ExpansionTooLarge { limit: 20, .. }));
        assert!(err.to_string().starts_with("expanded pattern exceeds 20 bytes"));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let reg = registry(&[("OPEN", "(abc")]);
        let err = compile(&reg, "%{OPEN}").unwrap_err();
        assert!(matches!(err, CompileError::InvalidRegex { .. }));
    }

    #[test]
    fn lookaround_selects_backtracking_engine() {
        let reg = registry(&[("NUM", r"(?<![0-9])\d+")]);
        let p = compile(&reg, "%{NUM:n}").unwrap();
        assert_eq!(p.engine_kind(), EngineKind::Backtracking);
    }

    #[test]
    fn compile_is_deterministic() {
        let reg = Registry::with_builtins();
        let source = "%{COMBINEDAPACHELOG}";
        let a = compile(&reg, source).unwrap();
        let b = compile(&reg, source).unwrap();
        assert_eq!(a.expanded_regex(), b.expanded_regex());
        assert_eq!(a.fields(), b.fields());
    }

    #[test]
    fn compiled_pattern_is_a_snapshot() {
        let mut reg = registry(&[("X", "x")]);
        let p = compile(&reg, "%{X:v}").unwrap();
        reg.register("X", "y", Origin::User);
        assert_eq!(p.expanded_regex(), "(?P<__g0>x)");
        assert_eq!(compile(&reg, "%{X:v}").unwrap().expanded_regex(), "(?P<__g0>y)");
    }

    #[test]
    fn builtin_patterns_all_compile() {
        let reg = Registry::with_builtins();
        for name in reg.names() {
            let source = format!("%{{{name}}}");
            compile(&reg, &source).unwrap_or_else(|e| panic!("{name}: {e}"));
        }
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn unknown_names_never_compile(name in "[A-Z][A-Z0-9_]{0,12}") {
                let reg = registry(&[("KNOWN", "k")]);
                prop_assume!(name != "KNOWN");
                let source = format!("%{{KNOWN}}%{{{name}:f}}");
                let is_unknown = matches!(
                    compile(&reg, &source),
                    Err(CompileError::UnknownPattern { .. })
                );
                prop_assert!(is_unknown);
            }

            #[test]
            fn any_ring_of_definitions_is_a_cycle(len in 1usize..120, entry in 0usize..120) {
                let mut reg = Registry::new();
                for i in 0..len {
                    reg.register(format!("R{i}"), format!("r%{{R{}}}", (i + 1) % len), Origin::User);
                }
                let source = format!("%{{R{}}}", entry % len);
                let is_cycle = matches!(
                    compile(&reg, &source),
                    Err(CompileError::CyclicReference { .. })
                );
                prop_assert!(is_cycle);
            }

            #[test]
            fn literal_text_round_trips(text in "[a-z0-9 ]{0,40}") {
                let reg = Registry::new();
                let p = compile(&reg, &text).unwrap();
                prop_assert_eq!(p.expanded_regex(), text.as_str());
            }
        }
    }
}
