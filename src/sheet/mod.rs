//! Tabular grade-sheet readers.
//!
//! Every format implements [`SheetReader`]; [`reader_for`] picks the variant
//! from the file name, falling back to sniffing the content. New formats only
//! need a new implementation and an arm in [`reader_for`].

mod delimited;
mod gzip;

pub use delimited::DelimitedSheet;
pub use gzip::GzipSheet;

use bytes::Bytes;
use tracing::debug;

use crate::error::ImportError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One data row of a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based line in the source, for error reports.
    pub line: u64,
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Cell at `column`, or `""` when the row is short.
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Read access to a tabular source: one header row followed by data rows.
pub trait SheetReader: Send + Sync {
    /// Column names from the first row.
    ///
    /// # Errors
    ///
    /// [`ImportError::EmptyFile`] if there is no non-blank first row.
    fn parse_header(&self) -> Result<Vec<String>, ImportError>;

    /// Every row after the header. Fully blank rows are skipped.
    fn parse_rows(&self) -> Result<Vec<SheetRow>, ImportError>;
}

/// Chooses a reader for `name` and its raw bytes.
pub fn reader_for(name: &str, data: Bytes) -> Result<Box<dyn SheetReader>, ImportError> {
    let lower = name.to_ascii_lowercase();
    debug!(name, bytes = data.len(), "Selecting sheet reader");

    if lower.ends_with(".tsv.gz") {
        return Ok(Box::new(GzipSheet::decode(&data, b'\t')?));
    }
    if lower.ends_with(".gz") {
        return Ok(Box::new(GzipSheet::decode(&data, b',')?));
    }
    if lower.ends_with(".tsv") {
        return Ok(Box::new(DelimitedSheet::new(data, b'\t')));
    }
    if lower.ends_with(".csv") || lower.ends_with(".txt") {
        return Ok(Box::new(DelimitedSheet::new(data, b',')));
    }
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") || lower.ends_with(".ods") {
        return Err(ImportError::UnsupportedFormat(name.to_string()));
    }

    // No usable extension: sniff.
    if data.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(GzipSheet::decode(&data, b',')?))
    } else if std::str::from_utf8(&data).is_ok() {
        Ok(Box::new(DelimitedSheet::new(data, b',')))
    } else {
        Err(ImportError::UnsupportedFormat(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(text: &str) -> Bytes {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    #[test]
    fn test_csv_by_extension() {
        let reader = reader_for("grades.CSV", Bytes::from_static(b"cpf,Design\n1,MA\n")).unwrap();
        assert_eq!(reader.parse_header().unwrap(), vec!["cpf", "Design"]);
    }

    #[test]
    fn test_tsv_by_extension() {
        let reader = reader_for("grades.tsv", Bytes::from_static(b"cpf\tDesign\n1\tMA\n")).unwrap();
        assert_eq!(reader.parse_header().unwrap(), vec!["cpf", "Design"]);
        assert_eq!(reader.parse_rows().unwrap()[0].cells, vec!["1", "MA"]);
    }

    #[test]
    fn test_gzip_by_extension_and_by_magic() {
        let data = gzip("cpf,Design\n1,MPA\n");
        for name in ["grades.csv.gz", "upload"] {
            let reader = reader_for(name, data.clone()).unwrap();
            assert_eq!(reader.parse_header().unwrap(), vec!["cpf", "Design"]);
            assert_eq!(reader.parse_rows().unwrap()[0].cell(1), "MPA");
        }
    }

    #[test]
    fn test_spreadsheet_formats_are_unsupported() {
        let err = reader_for("grades.xlsx", Bytes::from_static(b"PK\x03\x04")).err();
        assert!(matches!(err, Some(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_short_row_reads_empty_cell() {
        let row = SheetRow {
            line: 2,
            cells: vec!["1".into()],
        };
        assert_eq!(row.cell(0), "1");
        assert_eq!(row.cell(3), "");
    }
}
