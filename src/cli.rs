use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "grokdebug",
    version,
    about = "Compile grok patterns and see what they extract from log lines"
)]
pub struct Args {
    /// Input files to match, one record per line; `-` or none reads stdin
    pub inputs: Vec<PathBuf>,

    /// Grok pattern text, e.g. '%{IP:client} %{WORD:method}'
    #[arg(short, long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Use a pattern saved in the library under TITLE
    #[arg(long, value_name = "TITLE", conflicts_with = "pattern")]
    pub pattern_title: Option<String>,

    /// Output format [default: table, or csv when --output ends in .csv]
    #[arg(short, long, value_parser = ["table", "csv", "json"])]
    pub format: Option<String>,

    /// Write the result table to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Load additional pattern-set files from DIR (repeatable)
    #[arg(long = "patterns-dir", value_name = "DIR")]
    pub patterns_dirs: Vec<PathBuf>,

    /// Path to configuration file [default: .grokdebug.yml]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Reject lines whose captures do not parse as their declared type
    #[arg(long)]
    pub strict_casts: bool,

    /// Maximum nesting of pattern references
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_depth: Option<u64>,

    /// Stop matching after MS milliseconds and show the lines done so far
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// List the loaded pattern sets, then exit
    #[arg(long)]
    pub list_sets: bool,

    /// Print the source of a pattern set, then exit
    #[arg(long, value_name = "SET")]
    pub show_set: Option<String>,

    /// List every pattern name, then exit
    #[arg(long)]
    pub list_patterns: bool,

    /// Print one pattern definition, then exit
    #[arg(long, value_name = "NAME")]
    pub show_pattern: Option<String>,

    /// Print the expanded regex and its fields instead of matching
    #[arg(long)]
    pub expand: bool,

    /// Save the pattern to the library under TITLE
    #[arg(long, value_name = "TITLE")]
    pub save: Option<String>,

    /// List saved pattern titles, then exit
    #[arg(long)]
    pub list_saved: bool,

    /// Delete a saved pattern, then exit
    #[arg(long, value_name = "TITLE")]
    pub delete: Option<String>,

    /// Saved-pattern library file
    #[arg(long, value_name = "FILE")]
    pub library: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_pattern_and_inputs() {
        let args = Args::parse_from([
            "grokdebug",
            "-p",
            "%{WORD:w}",
            "a.log",
            "-",
            "--patterns-dir",
            "one",
            "--patterns-dir",
            "two",
            "-f",
            "csv",
        ]);
        assert_eq!(args.pattern.as_deref(), Some("%{WORD:w}"));
        assert_eq!(args.inputs, vec![PathBuf::from("a.log"), PathBuf::from("-")]);
        assert_eq!(args.patterns_dirs.len(), 2);
        assert_eq!(args.format.as_deref(), Some("csv"));
        assert!(!args.strict_casts);
    }

    #[test]
    fn pattern_and_title_conflict() {
        let result = Args::try_parse_from(["grokdebug", "-p", "x", "--pattern-title", "t"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_format_and_zero_depth() {
        assert!(Args::try_parse_from(["grokdebug", "-f", "xml"]).is_err());
        assert!(Args::try_parse_from(["grokdebug", "--max-depth", "0"]).is_err());
    }
}
