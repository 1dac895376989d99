//! Built-in pattern sets embedded in the binary.
//!
//! Each set is the content of one file under `patterns/`, keyed by file name.
//! The sets follow the stock grok library and are loaded, in order, into every
//! registry built with [`Registry::with_builtins`](super::registry::Registry::with_builtins).
//! Later sets may reference names from earlier ones.

/// A named pattern-set file.
pub struct PatternSet {
    pub name: &'static str,
    pub source: &'static str,
}

pub const BUILTIN_SETS: &[PatternSet] = &[
    PatternSet {
        name: "grok-patterns",
        source: include_str!("../../patterns/grok-patterns"),
    },
    PatternSet {
        name: "httpd",
        source: include_str!("../../patterns/httpd"),
    },
    PatternSet {
        name: "java",
        source: include_str!("../../patterns/java"),
    },
    PatternSet {
        name: "haproxy",
        source: include_str!("../../patterns/haproxy"),
    },
    PatternSet {
        name: "linux-syslog",
        source: include_str!("../../patterns/linux-syslog"),
    },
    PatternSet {
        name: "mongodb",
        source: include_str!("../../patterns/mongodb"),
    },
    PatternSet {
        name: "postgresql",
        source: include_str!("../../patterns/postgresql"),
    },
    PatternSet {
        name: "redis",
        source: include_str!("../../patterns/redis"),
    },
    PatternSet {
        name: "ruby",
        source: include_str!("../../patterns/ruby"),
    },
];
