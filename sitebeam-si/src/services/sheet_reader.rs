//! Spreadsheet ingestion
//!
//! Reads a CSV export into an ordered sequence of loosely-typed row
//! records. Pure read: no side effects, and cleanup of the source file
//! stays with the caller.

use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;

use sitebeam_common::{Error, Result};

/// One raw data row, 1-indexed in file order
///
/// Field names are the header cells, lowercased and trimmed; values are
/// kept as the raw strings from the file.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub row_number: u32,
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(row_number: u32, fields: HashMap<String, String>) -> Self {
        Self { row_number, fields }
    }

    /// Trimmed value for a header name; None when missing or blank
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Source file metadata captured at parse time
#[derive(Debug, Clone)]
pub struct SheetMeta {
    pub file_name: String,
    pub file_size: u64,
    pub row_count: u32,
}

/// Read a CSV file into its ordered row records
///
/// Fails with a parse error when the file is unreadable, has no header,
/// or contains zero data rows.
pub fn read_sheet(path: &Path) -> Result<(SheetMeta, Vec<RawRow>)> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| Error::Parse(format!("Cannot read {}: {}", path.display(), e)))?
        .len();

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::Parse(format!("Cannot open {}: {}", path.display(), e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Parse(format!("Cannot read header row: {}", e)))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    if headers.is_empty() {
        return Err(Error::Parse("Sheet has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::Parse(format!("Row {}: {}", idx + 1, e)))?;
        let mut fields = HashMap::with_capacity(headers.len());
        for (header, value) in headers.iter().zip(record.iter()) {
            fields.insert(header.clone(), value.to_string());
        }
        rows.push(RawRow::new((idx + 1) as u32, fields));
    }

    if rows.is_empty() {
        return Err(Error::Parse("Sheet contains no data rows".to_string()));
    }

    let meta = SheetMeta {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        file_size,
        row_count: rows.len() as u32,
    };

    Ok((meta, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_rows_in_file_order() {
        let file = write_csv("Mark,Level,Type\nB-101,L1,beam\nC-201,L2,column\n");
        let (meta, rows) = read_sheet(file.path()).unwrap();

        assert_eq!(meta.row_count, 2);
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[0].get("mark"), Some("B-101"));
        assert_eq!(rows[1].get("type"), Some("column"));
    }

    #[test]
    fn blank_cells_read_as_missing() {
        let file = write_csv("mark,level\nB-101,\n");
        let (_, rows) = read_sheet(file.path()).unwrap();
        assert_eq!(rows[0].get("level"), None);
    }

    #[test]
    fn empty_sheet_is_a_parse_error() {
        let file = write_csv("mark,level\n");
        assert!(matches!(
            read_sheet(file.path()),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn unreadable_file_is_a_parse_error() {
        assert!(matches!(
            read_sheet(Path::new("/nonexistent/sheet.csv")),
            Err(Error::Parse(_))
        ));
    }
}
