use std::io::{self, Write};

use crate::formatter::Formatter;
use crate::table::ResultTable;

/// Column-aligned plain text with a trailing summary line.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_to(&self, table: &ResultTable, out: &mut dyn Write) -> io::Result<()> {
        if !table.columns.is_empty() {
            let cells: Vec<Vec<String>> = table
                .rows
                .iter()
                .map(|row| {
                    table
                        .columns
                        .iter()
                        .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default())
                        .collect()
                })
                .collect();

            let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
            for row in &cells {
                for (w, cell) in widths.iter_mut().zip(row) {
                    *w = (*w).max(cell.chars().count());
                }
            }

            write_row(out, &table.columns, &widths)?;
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            write_row(out, &rule, &widths)?;
            for row in &cells {
                write_row(out, row, &widths)?;
            }
            writeln!(out)?;
        }

        let total = table.matched + table.unmatched;
        let line_word = if total == 1 { "line" } else { "lines" };
        writeln!(out, "{} of {total} {line_word} matched", table.matched)
    }
}

fn write_row(out: &mut dyn Write, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        let pad = width.saturating_sub(cell.chars().count());
        line.extend(std::iter::repeat_n(' ', pad));
    }
    writeln!(out, "{}", line.trim_end())
}
