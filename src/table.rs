//! Numeric tables and the loaders producing them.
//!
//! A [`Table`] is a dense row-major table with columns `[time, input_signal, channel_0, ...]`.
//! Loaders implement the [`TableLoader`] trait. Only CSV files are currently supported; waveform
//! dumps are a capability a loader may advertise through [`TableLoader::supports`].
use itertools::Itertools;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::ReadoutError;

/// A dense numeric table with equal-length rows and non-decreasing time (first column).
#[derive(Debug, PartialEq, Clone)]
pub struct Table {
    rows: Vec<Vec<f64>>,
    num_columns: usize,
}

impl Table {
    /// Create a table from rows.
    /// Returns an error if the rows do not all have the same length or if time decreases.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, ReadoutError> {
        let num_columns = rows.first().map(|row| row.len()).unwrap_or(0);

        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != num_columns)
        {
            return Err(ReadoutError::InvalidShape(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                num_columns
            )));
        }

        if num_columns > 0 {
            if let Some(i) = rows.iter().position(|row| !row[0].is_finite()) {
                return Err(ReadoutError::InvalidShape(format!(
                    "row {} has a non-finite time {}",
                    i, rows[i][0]
                )));
            }
            if let Some((i, _)) = rows
                .iter()
                .tuple_windows()
                .enumerate()
                .find(|(_, (prev, next))| next[0] < prev[0])
            {
                return Err(ReadoutError::InvalidShape(format!(
                    "time decreases between rows {} and {}",
                    i,
                    i + 1
                )));
            }
        }

        Ok(Table { rows, num_columns })
    }

    /// Returns the number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns.
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Returns the rows of the table.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Returns the value at the given row and column.
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.rows.get(row).and_then(|row| row.get(column)).copied()
    }

    /// Returns a copy of the given column, or `None` if the column is out of range.
    pub fn column(&self, column: usize) -> Option<Vec<f64>> {
        if column >= self.num_columns {
            return None;
        }
        Some(self.rows.iter().map(|row| row[column]).collect())
    }
}

/// The kind of file a table can be loaded from.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FileKind {
    /// Comma-separated values, one row per line and no header.
    Csv,
    /// A simulator waveform dump (VCD).
    WaveformDump,
}

impl FileKind {
    /// Returns the file kind from the path extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ReadoutError> {
        let path = path.as_ref();
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(FileKind::Csv),
            Some("vcd") => Ok(FileKind::WaveformDump),
            _ => Err(ReadoutError::UnsupportedFormat(format!(
                "cannot infer the file kind of {}",
                path.display()
            ))),
        }
    }
}

/// A collaborator turning a file into a validated table.
pub trait TableLoader {
    /// Returns true if the loader is able to read files of the given kind.
    fn supports(&self, kind: FileKind) -> bool;

    /// Load a table from the file at the given path.
    fn load(&self, path: &Path) -> Result<Table, ReadoutError>;
}

/// A loader for headerless CSV tables.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    delimiter: u8,
}

impl Default for CsvLoader {
    fn default() -> Self {
        CsvLoader { delimiter: b',' }
    }
}

impl CsvLoader {
    /// Create a loader with a custom field delimiter.
    pub fn with_delimiter(delimiter: u8) -> Self {
        CsvLoader { delimiter }
    }

    /// Read a table from any reader.
    pub fn read<R: std::io::Read>(&self, reader: R) -> Result<Table, ReadoutError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| ReadoutError::Parse(e.to_string()))?;
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|e| {
                        ReadoutError::Parse(format!("row {}: invalid value {:?}: {}", i, field, e))
                    })
                })
                .collect::<Result<Vec<f64>, ReadoutError>>()?;
            rows.push(row);
        }

        log::debug!("Read {} rows from CSV", rows.len());

        Table::new(rows).map_err(|e| match e {
            ReadoutError::InvalidShape(e) => ReadoutError::Parse(e),
            e => e,
        })
    }
}

impl TableLoader for CsvLoader {
    fn supports(&self, kind: FileKind) -> bool {
        kind == FileKind::Csv
    }

    fn load(&self, path: &Path) -> Result<Table, ReadoutError> {
        let kind = FileKind::from_path(path)?;
        if !self.supports(kind) {
            return Err(ReadoutError::UnsupportedFormat(format!(
                "{:?} files are not supported yet ({})",
                kind,
                path.display()
            )));
        }

        let file = File::open(path).map_err(|e| ReadoutError::IOError(e.to_string()))?;
        let table = self.read(BufReader::new(file))?;
        log::info!(
            "Loaded {} ({} rows, {} columns)",
            path.display(),
            table.num_rows(),
            table.num_columns()
        );
        Ok(table)
    }
}

/// A value change of a signal at a given time, as found in waveform dumps.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ValueChange {
    pub time: f64,
    pub signal_id: usize,
    pub value: f64,
}

impl ValueChange {
    pub fn new(time: f64, signal_id: usize, value: f64) -> Self {
        ValueChange {
            time,
            signal_id,
            value,
        }
    }
}

/// Align value changes of several signals on a common time base.
/// One row is produced per distinct time, with layout `[time, signal_0, ..., signal_{n-1}]`.
/// Signals without a change at a given time keep their previous value (forward-filling), and
/// every signal starts at zero.
pub fn align_value_changes(
    num_signals: usize,
    changes: &[ValueChange],
) -> Result<Table, ReadoutError> {
    if let Some(change) = changes.iter().find(|c| c.signal_id >= num_signals) {
        return Err(ReadoutError::InvalidParameter(format!(
            "signal {} out of range for {} signals",
            change.signal_id, num_signals
        )));
    }
    if changes.iter().any(|c| !c.time.is_finite()) {
        return Err(ReadoutError::InvalidParameter(
            "change times must be finite".to_string(),
        ));
    }

    let mut changes = changes.to_vec();
    changes.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut state = vec![0.0; num_signals];
    let rows = changes
        .iter()
        .chunk_by(|change| change.time)
        .into_iter()
        .map(|(time, group)| {
            for change in group {
                state[change.signal_id] = change.value;
            }
            std::iter::once(time).chain(state.iter().copied()).collect()
        })
        .collect::<Vec<Vec<f64>>>();

    Table::new(rows)
}
