//! Parsing and serialization of delimited table files

use crate::error::{Error, Result};
use crate::table::{Delimiter, LineEnding, Table};
use std::fs;
use std::path::{Path, PathBuf};

/// Parse delimited text into a Table.
///
/// The first surviving row is the header; rows that are empty or all-empty
/// are dropped; short rows are padded and long rows truncated to the header
/// length. Fails with a format error when nothing survives filtering.
pub fn parse(text: &str, source: impl Into<PathBuf>) -> Result<Table> {
    let source = source.into();
    let line_ending = LineEnding::detect(text);
    let delimiter = Delimiter::detect(text.lines().next().unwrap_or(""));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut records: Vec<Vec<String>> = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| Error::Csv {
            path: source.clone(),
            source: e,
        })?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
        if header.is_none() {
            let mut cols = fields;
            if let Some(first) = cols.first_mut() {
                *first = first.trim_start_matches('\u{feff}').to_string();
            }
            header = Some(cols);
        } else {
            records.push(fields);
        }
    }

    let Some(header) = header else {
        return Err(Error::Format {
            path: source,
            message: "no rows remain after filtering".to_string(),
        });
    };

    let mut table = Table::new(header, delimiter, line_ending);
    table.source_path = source;
    for rec in records {
        table.push_record(rec);
    }
    Ok(table)
}

/// Serialize a Table back to text using its stored delimiter and
/// line-ending convention, quoting only where the syntax requires it.
pub fn serialize(table: &Table) -> Result<String> {
    let terminator = match table.line_ending {
        LineEnding::Lf => csv::Terminator::Any(b'\n'),
        LineEnding::CrLf => csv::Terminator::CRLF,
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(table.delimiter.byte())
        .terminator(terminator)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer
        .write_record(&table.header)
        .map_err(|e| Error::Csv {
            path: table.source_path.clone(),
            source: e,
        })?;
    for record in &table.records {
        writer.write_record(&record.values).map_err(|e| Error::Csv {
            path: table.source_path.clone(),
            source: e,
        })?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::Format {
        path: table.source_path.clone(),
        message: format!("serialized table is not valid UTF-8: {}", e),
    })
}

/// Read and parse a table file
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&text, path)
}

/// Serialize a table and write it, creating parent directories as needed
pub fn write_table<P: AsRef<Path>>(path: P, table: &Table) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serialize(table)?)?;
    Ok(())
}
