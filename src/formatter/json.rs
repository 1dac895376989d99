use std::io::{self, Write};

use crate::formatter::Formatter;
use crate::table::ResultTable;

/// A JSON array with one object per matched line. Values keep their cast
/// types; missing fields are left out of the object.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_to(&self, table: &ResultTable, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, &table.rows)?;
        writeln!(out)
    }
}
