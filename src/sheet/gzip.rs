use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;

use super::{DelimitedSheet, SheetReader, SheetRow};
use crate::error::ImportError;

/// A gzip-compressed delimited sheet, decompressed once up front.
pub struct GzipSheet {
    inner: DelimitedSheet,
}

impl GzipSheet {
    /// Decompresses `data` and wraps it as a delimited sheet.
    ///
    /// # Errors
    ///
    /// [`ImportError::Malformed`] if `data` is not valid gzip.
    pub fn decode(data: &[u8], delimiter: u8) -> Result<Self, ImportError> {
        let mut decoded = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut decoded)
            .map_err(|e| ImportError::Malformed(format!("gzip: {e}")))?;

        Ok(Self {
            inner: DelimitedSheet::new(Bytes::from(decoded), delimiter),
        })
    }
}

impl SheetReader for GzipSheet {
    fn parse_header(&self) -> Result<Vec<String>, ImportError> {
        self.inner.parse_header()
    }

    fn parse_rows(&self) -> Result<Vec<SheetRow>, ImportError> {
        self.inner.parse_rows()
    }
}
