use std::io::{self, Write};

use crate::formatter::Formatter;
use crate::table::ResultTable;

/// One header row of column names, then one record per matched line. Cells
/// hold the plain scalar text of each value; missing values are empty.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_to(&self, table: &ResultTable, out: &mut dyn Write) -> io::Result<()> {
        if table.columns.is_empty() {
            return Ok(());
        }
        let mut writer = ::csv::Writer::from_writer(out);
        writer.write_record(&table.columns)?;
        for row in &table.rows {
            let record = table
                .columns
                .iter()
                .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default());
            writer.write_record(record)?;
        }
        writer.flush()
    }
}
