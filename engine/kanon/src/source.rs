//! Headerless comma-delimited record files, in the layout of the UCI adult
//! data: one record per line, fields separated by `,` with optional leading
//! spaces.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kanon_record::{Record, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// Parses every non-blank line of `text` into a record with the given
/// column names. Line numbers in errors are 1-based.
pub fn parse_records(text: &str, columns: &[String]) -> Result<Vec<Record>, SourceError> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != columns.len() {
            return Err(SourceError::FieldCount {
                line: idx + 1,
                expected: columns.len(),
                found: fields.len(),
            });
        }
        let record = Record::from_pairs(
            columns
                .iter()
                .zip(fields)
                .map(|(name, raw)| (name.as_str(), Value::parse_field(raw))),
        );
        records.push(record);
    }
    log::debug!("parsed {} records", records.len());
    Ok(records)
}

pub fn read_records(path: &Path, columns: &[String]) -> Result<Vec<Record>, SourceError> {
    let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&text, columns)
}

/// Renders records in the input layout, one per line, values in attribute
/// order.
pub fn render_records(records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        let fields: Vec<String> = record.iter().map(|(_, v)| v.to_string()).collect();
        out.push_str(&fields.join(", "));
        out.push('\n');
    }
    out
}

pub fn write_records(path: &Path, records: &[Record]) -> Result<(), SourceError> {
    fs::write(path, render_records(records)).map_err(|source| SourceError::Write {
        path: path.to_path_buf(),
        source,
    })
}
