use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use crate::normalization::header::HeaderMap;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encoding a vendor export was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Utf8Bom,
    Latin1,
}

impl SourceEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Utf8Bom => "utf-8-sig",
            SourceEncoding::Latin1 => "latin-1",
        }
    }
}

/// Decode raw export bytes: UTF-8 (BOM stripped) first, Latin-1 otherwise.
///
/// Latin-1 is decoded through windows-1252, which maps every byte, so the
/// fallback cannot fail.
pub fn decode_export(bytes: &[u8]) -> (Cow<'_, str>, SourceEncoding) {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        if let Ok(text) = std::str::from_utf8(rest) {
            return (Cow::Borrowed(text), SourceEncoding::Utf8Bom);
        }
    } else if let Ok(text) = std::str::from_utf8(bytes) {
        return (Cow::Borrowed(text), SourceEncoding::Utf8);
    }
    let (text, had_errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    if had_errors {
        warn!("latin-1 decode reported replacement characters");
    }
    (text, SourceEncoding::Latin1)
}

/// A vendor export held in memory: trimmed headers plus raw string cells.
#[derive(Debug, Clone)]
pub struct SourceTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    header_map: HeaderMap,
}

impl SourceTable {
    /// Build from already-split parts. Blank headers get the spreadsheet
    /// placeholder name `Unnamed: <index>`.
    pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers
            .into_iter()
            .enumerate()
            .map(|(idx, h)| {
                let h = h.trim();
                if h.is_empty() {
                    unnamed_header(idx)
                } else {
                    h.to_string()
                }
            })
            .collect();
        let header_map = HeaderMap::new(&headers);
        Self {
            headers,
            rows,
            header_map,
        }
    }

    pub fn from_csv_text(text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::None)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .context("source export has no header row")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (idx, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("malformed source row {}", idx + 2))?;
            rows.push(rec.iter().map(str::to_string).collect());
        }
        Ok(Self::from_parts(headers, rows))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read source export {}", path.display()))?;
        let (text, encoding) = decode_export(&bytes);
        debug!(path = %path.display(), encoding = encoding.label(), "decoded source export");
        Self::from_csv_text(&text)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.header_map
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw header position, exact match.
    pub fn position(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Every cell of one column; short rows yield empty strings.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(col).map(String::as_str).unwrap_or(""))
    }
}

fn unnamed_header(idx: usize) -> String {
    format!("Unnamed: {idx}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utf8_bom() {
        let bytes = b"\xEF\xBB\xBFclave1,precio1\nA1,10\n";
        let (text, enc) = decode_export(bytes);
        assert_eq!(enc, SourceEncoding::Utf8Bom);
        assert!(text.starts_with("clave1"));
    }

    #[test]
    fn falls_back_to_latin1() {
        // "Descripción" with ó as a single 0xF3 byte
        let bytes = b"Descripci\xF3n,precio1\nPan,1\n";
        let (text, enc) = decode_export(bytes);
        assert_eq!(enc, SourceEncoding::Latin1);
        assert!(text.starts_with("Descripción"));
    }

    #[test]
    fn names_blank_headers_and_trims_others() {
        let table = SourceTable::from_csv_text(" Clave1 ,,Precio1\nA,x,1\n").unwrap();
        assert_eq!(table.headers(), &["Clave1", "Unnamed: 1", "Precio1"]);
        assert_eq!(table.header_map().get("unnamed: 1"), Some(1));
        assert_eq!(table.position("Unnamed: 1"), Some(1));
    }

    #[test]
    fn short_rows_read_as_empty() {
        let table = SourceTable::from_csv_text("a,b,c\n1,2\n4,5,6\n").unwrap();
        let col: Vec<_> = table.column(2).collect();
        assert_eq!(col, vec!["", "6"]);
        assert_eq!(table.len(), 2);
    }
}
