use bytes::Bytes;
use csv::{ReaderBuilder, StringRecord, Trim};

use super::{SheetReader, SheetRow};
use crate::error::ImportError;

/// Comma- or tab-separated text with a header row.
pub struct DelimitedSheet {
    data: Bytes,
    delimiter: u8,
}

impl DelimitedSheet {
    pub fn new(data: Bytes, delimiter: u8) -> Self {
        Self { data, delimiter }
    }

    fn records(&self) -> impl Iterator<Item = csv::Result<StringRecord>> + '_ {
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(strip_bom(&self.data))
            .into_records()
    }
}

impl SheetReader for DelimitedSheet {
    fn parse_header(&self) -> Result<Vec<String>, ImportError> {
        let header = match self.records().next() {
            Some(record) => record?,
            None => return Err(ImportError::EmptyFile),
        };

        let columns: Vec<String> = header.iter().map(str::to_string).collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(ImportError::EmptyFile);
        }
        Ok(columns)
    }

    fn parse_rows(&self) -> Result<Vec<SheetRow>, ImportError> {
        let mut rows = Vec::new();

        for result in self.records().skip(1) {
            let record = result?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            rows.push(SheetRow {
                line,
                cells: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(rows)
    }
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(text: &'static str) -> DelimitedSheet {
        DelimitedSheet::new(Bytes::from_static(text.as_bytes()), b',')
    }

    #[test]
    fn test_header_is_trimmed() {
        let s = sheet("\u{feff} cpf , Requirements ,Design\n");
        assert_eq!(s.parse_header().unwrap(), vec!["cpf", "Requirements", "Design"]);
    }

    #[test]
    fn test_empty_file_has_no_header() {
        assert!(matches!(sheet("").parse_header(), Err(ImportError::EmptyFile)));
        assert!(matches!(sheet(",,\n").parse_header(), Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_rows_keep_line_numbers_and_skip_blanks() {
        let s = sheet("cpf,Design\n111,MA\n,\n222,MPA\n");
        let rows = s.parse_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].cells, vec!["222", "MPA"]);
    }

    #[test]
    fn test_header_only_has_no_rows() {
        assert!(sheet("cpf,Design\n").parse_rows().unwrap().is_empty());
    }

    #[test]
    fn test_quoted_cells() {
        let s = sheet("cpf,\"Project Management\"\n\"123.456.789-00\",MANA\n");
        assert_eq!(s.parse_header().unwrap()[1], "Project Management");
        assert_eq!(s.parse_rows().unwrap()[0].cell(0), "123.456.789-00");
    }
}
