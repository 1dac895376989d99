pub mod csv;
pub mod json;
pub mod table;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::table::ResultTable;

pub const FORMATS: &[&str] = &["table", "csv", "json"];

pub trait Formatter {
    fn format_to(&self, table: &ResultTable, out: &mut dyn Write) -> io::Result<()>;

    fn print(&self, table: &ResultTable) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.format_to(table, &mut lock)
    }
}

pub fn create_formatter(format: &str) -> Box<dyn Formatter> {
    match format {
        "csv" => Box::new(self::csv::CsvFormatter),
        "json" => Box::new(json::JsonFormatter),
        // "table" and any unknown value
        _ => Box::new(table::TableFormatter),
    }
}

/// Write `table` to `path` as CSV, replacing any existing file.
pub fn export_csv(table: &ResultTable, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    self::csv::CsvFormatter
        .format_to(table, &mut out)
        .and_then(|()| out.flush())
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(rows = table.rows.len(), path = %path.display(), "exported csv");
    Ok(())
}
