//! Reading the state x event grid.

use crate::error::LoaderError;
use std::io::Read;

/// A grid as text, before any cell is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    /// Event headers, from the second column of the first row onwards.
    pub events: Vec<String>,
    pub rows: Vec<GridRow>,
}

/// One state row of the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    /// Line the row starts on, for error messages.
    pub line: u64,
    pub state: String,
    /// Cells in event column order. May be shorter than the header.
    pub cells: Vec<String>,
}

impl Grid {
    /// Reads a delimited grid.
    ///
    /// Quoted fields are supported and surrounding whitespace is trimmed.
    /// Blank lines, and rows where every field is empty, are skipped.
    pub fn read<R: Read>(reader: R, delimiter: u8) -> Result<Self, LoaderError> {
        let mut grid = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(delimiter)
            .from_reader(reader);

        let mut records = grid.records();

        let header = loop {
            match records.next() {
                None => return Err(LoaderError::EmptyGrid),
                Some(record) => {
                    let record = record?;
                    if record.iter().any(|f| !f.is_empty()) {
                        break record;
                    }
                }
            }
        };

        let events: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        let mut rows = Vec::new();

        for record in records {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }

            let line = record.position().map(|p| p.line()).unwrap_or_default();
            if record.len() > events.len() + 1 {
                // Trailing empty fields are tolerated, anything else is not.
                if record.iter().skip(events.len() + 1).any(|f| !f.is_empty()) {
                    return Err(LoaderError::RaggedRow {
                        line,
                        len: record.len(),
                        header_len: events.len() + 1,
                    });
                }
            }

            let state = record.get(0).unwrap_or_default().to_string();
            if state.is_empty() {
                return Err(LoaderError::EmptyStateName { line });
            }

            let cells = record
                .iter()
                .skip(1)
                .take(events.len())
                .map(str::to_string)
                .collect();

            rows.push(GridRow { line, state, cells });
        }

        Ok(Self { events, rows })
    }

    /// First-column state names in row order.
    pub fn states(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(|r| r.state.as_str())
    }
}
