//! Append-only text logs (associations, depth, color ticks)

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::StorageError;

/// First field, a tab, then the remaining fields separated by spaces
pub fn format_record(fields: &[&str]) -> String {
    match fields.split_first() {
        Some((key, rest)) if !rest.is_empty() => format!("{key}\t{}", rest.join(" ")),
        Some((key, _)) => (*key).to_owned(),
        None => String::new(),
    }
}

/// Append one newline-terminated record. The file is opened and closed per call.
pub fn append_log_record(path: &Path, fields: &[&str]) -> Result<(), StorageError> {
    let mut line = format_record(fields);
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;
    // One write call per record keeps lines whole
    file.write_all(line.as_bytes())
        .map_err(|e| StorageError::io(path, e))
}

/// Split a record back into its key and remaining fields
pub fn parse_record(line: &str) -> Option<(&str, Vec<&str>)> {
    let (key, rest) = line.split_once('\t')?;
    Some((key, rest.split(' ').filter(|f| !f.is_empty()).collect()))
}
