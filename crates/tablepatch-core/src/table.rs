//! Core table types: an in-memory delimited table and its records

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Line-ending convention of a source file, preserved through serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// Detect the dominant line ending by counting occurrences.
    /// CRLF wins when it accounts for at least half of the newlines.
    pub fn detect(text: &str) -> Self {
        let crlf = text.matches("\r\n").count();
        let lf = text.matches('\n').count();
        if crlf > 0 && crlf * 2 >= lf {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Field delimiter of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delimiter {
    Tab,
    Semicolon,
}

impl Delimiter {
    /// Sniff the delimiter from the header line: tab wins, then semicolon,
    /// falling back to tab.
    pub fn detect(header_line: &str) -> Self {
        if header_line.contains('\t') {
            Delimiter::Tab
        } else if header_line.contains(';') {
            Delimiter::Semicolon
        } else {
            Delimiter::Tab
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Semicolon => b';',
        }
    }
}

/// One row's values, positionally aligned with the owning table's header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<String>,
}

impl Record {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(|s| s.as_str())
    }
}

/// A parsed delimited table: ordered header, ordered records, and the
/// formatting conventions of the file it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Column names in file order
    pub header: Vec<String>,
    /// Data records; every record has exactly `header.len()` values
    pub records: Vec<Record>,
    /// Field delimiter of the source file
    pub delimiter: Delimiter,
    /// Line-ending convention of the source file
    pub line_ending: LineEnding,
    /// Source file path
    pub source_path: PathBuf,
}

/// Lowercased, trimmed, BOM-stripped column name used for all
/// case-insensitive header matching
pub fn normalize_column(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

impl Table {
    pub fn new(header: Vec<String>, delimiter: Delimiter, line_ending: LineEnding) -> Self {
        Self {
            header,
            records: Vec::new(),
            delimiter,
            line_ending,
            source_path: PathBuf::new(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Find a column index by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|c| c == name)
    }

    /// Find a column index case-insensitively (BOM/whitespace tolerant)
    pub fn column_index_ci(&self, name: &str) -> Option<usize> {
        let want = normalize_column(name);
        self.header.iter().position(|c| normalize_column(c) == want)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index_ci(name).is_some()
    }

    /// Read a cell by record index and column name (case-insensitive)
    pub fn value(&self, record: usize, column: &str) -> Option<&str> {
        let idx = self.column_index_ci(column)?;
        self.records.get(record).and_then(|r| r.get(idx))
    }

    /// Write a cell by record index and column name; returns true when the
    /// stored value actually changed. Absent columns and out-of-range
    /// records are a no-op.
    pub fn set_value(&mut self, record: usize, column: &str, value: &str) -> bool {
        let Some(idx) = self.column_index_ci(column) else {
            return false;
        };
        let Some(rec) = self.records.get_mut(record) else {
            return false;
        };
        if rec.values[idx] == value {
            return false;
        }
        rec.values[idx] = value.to_string();
        true
    }

    /// First record whose key column equals `key` after trimming
    pub fn find_record(&self, key_column: &str, key: &str) -> Option<usize> {
        let idx = self.column_index_ci(key_column)?;
        self.records
            .iter()
            .position(|r| r.get(idx).map(str::trim) == Some(key.trim()))
    }

    /// Append a record, padding or truncating it to the header length
    pub fn push_record(&mut self, mut values: Vec<String>) {
        values.resize(self.header.len(), String::new());
        self.records.push(Record::new(values));
    }
}

/// Two tables are equal iff headers and all records compare equal in order;
/// formatting conventions and source paths do not participate.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.records == other.records
    }
}

/// A per-record boolean condition restricting which records a transform may
/// touch: "column equals this sentinel value" (trimmed comparison).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub column: String,
    pub equals: String,
}

impl Gate {
    pub fn new(column: impl Into<String>, equals: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            equals: equals.into(),
        }
    }

    /// Strict match: false when the gate column is absent
    pub fn matches(&self, table: &Table, record: usize) -> bool {
        match table.value(record, &self.column) {
            Some(v) => v.trim() == self.equals.trim(),
            None => false,
        }
    }

    /// Eligibility check: when the gate column is absent from the header,
    /// every record is eligible
    pub fn admits(&self, table: &Table, record: usize) -> bool {
        if !table.has_column(&self.column) {
            return true;
        }
        self.matches(table, record)
    }
}
