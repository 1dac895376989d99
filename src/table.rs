//! Aggregating per-line match results into a column-unioned table.

use serde::Serialize;

use crate::grok::{FieldMap, FieldValue, MatchResult};

/// Rows of matched lines under the union of their field names.
///
/// Columns appear in the order they were first seen. A row lacks a value for
/// any column its line did not capture; renderers show those cells blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<FieldMap>,
    pub matched: usize,
    pub unmatched: usize,
}

impl ResultTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The value in `row` under `column`, if that line captured it.
    pub fn cell(&self, row: usize, column: &str) -> Option<&FieldValue> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

#[derive(Debug, Default)]
pub struct TableBuilder {
    table: ResultTable,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line's outcome. `None` counts as an unmatched line.
    pub fn push(&mut self, result: Option<MatchResult>) {
        let Some(result) = result else {
            self.table.unmatched += 1;
            return;
        };
        for name in result.values.keys() {
            if !self.table.columns.iter().any(|c| c == name) {
                self.table.columns.push(name.clone());
            }
        }
        self.table.rows.push(result.values);
        self.table.matched += 1;
    }

    pub fn finish(self) -> ResultTable {
        self.table
    }
}

/// Build a table from per-line results in input order.
pub fn build<I>(results: I) -> ResultTable
where
    I: IntoIterator<Item = Option<MatchResult>>,
{
    let mut builder = TableBuilder::new();
    for result in results {
        builder.push(result);
    }
    builder.finish()
}
