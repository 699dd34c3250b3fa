// src/loading/csv_loader.rs
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use encoding_rs::{mem::decode_latin1, UTF_8, WINDOWS_1252};
use log::{debug, info};
use std::fs;
use std::path::Path;

use super::{to_cell, RawTable};
use crate::models::stats_models::LoadReport;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A byte-to-text decoding that either accepts every byte or rejects the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoder {
    Utf8,
    /// ISO-8859-1: each byte is the code point of the same value. Never fails.
    Latin1,
    /// Windows code page 1252, which maps 0x80..=0x9F to typographic characters.
    Windows1252,
}

impl TextDecoder {
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextDecoder::Utf8 => UTF_8
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
            TextDecoder::Latin1 => Some(decode_latin1(bytes).into_owned()),
            TextDecoder::Windows1252 => WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
        }
    }
}

/// Encodings tried, in order, when decoding delimited input. Latin-1 accepts
/// any byte sequence, so the entries after it only apply to shorter tables.
pub const INPUT_ENCODINGS: [(&str, TextDecoder); 4] = [
    ("utf-8", TextDecoder::Utf8),
    ("latin-1", TextDecoder::Latin1),
    ("iso-8859-1", TextDecoder::Latin1),
    ("cp1252", TextDecoder::Windows1252),
];

/// Reads a delimited file, decoding it with the first supported encoding
/// that accepts every byte.
pub fn read_delimited(path: &Path) -> Result<RawTable> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (text, encoding) = decode_with_fallback(&bytes, &INPUT_ENCODINGS)
        .with_context(|| format!("Could not decode {}", path.display()))?;
    info!("✓ Decoded {} with {} encoding", path.display(), encoding);
    parse_delimited(&text, encoding)
        .with_context(|| format!("Failed to parse delimited data in {}", path.display()))
}

/// Tries each encoding in order and returns the decoded text with the name
/// of the one that worked. Fails only when no encoding decodes the bytes.
pub fn decode_with_fallback(
    bytes: &[u8],
    encodings: &[(&'static str, TextDecoder)],
) -> Result<(String, &'static str)> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    for (name, decoder) in encodings {
        match decoder.decode(body) {
            Some(text) => return Ok((text, *name)),
            None => debug!("✗ Input is not valid {}", name),
        }
    }
    let names: Vec<&str> = encodings.iter().map(|(name, _)| *name).collect();
    bail!(
        "input is unreadable under every supported encoding ({})",
        names.join(", ")
    )
}

/// Parses decoded CSV text. Rows with more fields than the header, and rows
/// the reader rejects, are skipped and counted; short rows are padded with
/// missing cells.
pub fn parse_delimited(text: &str, encoding: &'static str) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        bail!("input has no header row");
    }

    let mut report = LoadReport {
        encoding: Some(encoding),
        ..Default::default()
    };
    let mut rows = Vec::new();

    for result in rdr.records() {
        report.rows_seen += 1;
        match result {
            Ok(record) if record.len() <= headers.len() => {
                let mut cells: Vec<Option<String>> = record.iter().map(to_cell).collect();
                cells.resize(headers.len(), None);
                rows.push(cells);
            }
            Ok(record) => {
                report.skipped_rows += 1;
                debug!(
                    "Skipping row {}: {} fields for {} columns",
                    report.rows_seen,
                    record.len(),
                    headers.len()
                );
            }
            Err(e) => {
                report.skipped_rows += 1;
                debug!("Skipping row {}: {}", report.rows_seen, e);
            }
        }
    }

    report.rows_loaded = rows.len();
    Ok(RawTable {
        headers,
        rows,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_utf8_wins_when_valid() {
        let (text, encoding) =
            decode_with_fallback("CITY\nPUNE\n".as_bytes(), &INPUT_ENCODINGS).unwrap();
        assert_eq!(encoding, "utf-8");
        assert_eq!(text, "CITY\nPUNE\n");
    }

    #[test]
    fn test_latin1_fallback_on_invalid_utf8() {
        // 0xE9 is 'é' in latin-1 and an invalid lone byte in UTF-8
        let bytes = b"NAME\nJos\xE9\n";
        let (text, encoding) = decode_with_fallback(bytes, &INPUT_ENCODINGS).unwrap();
        assert_eq!(encoding, "latin-1");
        assert!(text.contains("José"));
    }

    #[test]
    fn test_bom_is_stripped() {
        let bytes = b"\xEF\xBB\xBFOOWNCODE\nA1\n";
        let (text, _) = decode_with_fallback(bytes, &INPUT_ENCODINGS).unwrap();
        assert!(text.starts_with("OOWNCODE"));
    }

    #[test]
    fn test_unreadable_under_every_encoding_is_fatal() {
        let utf8_only = [("utf-8", TextDecoder::Utf8)];
        let err = decode_with_fallback(b"\xFF\xFE\xFD", &utf8_only).unwrap_err();
        assert!(err.to_string().contains("unreadable"));
        assert!(err.to_string().contains("utf-8"));
    }

    #[test]
    fn test_latin1_maps_c1_bytes_to_same_code_point() {
        let (text, encoding) = decode_with_fallback(b"A\n\x80\n", &INPUT_ENCODINGS).unwrap();
        assert_eq!(encoding, "latin-1");
        assert_eq!(text, "A\n\u{80}\n");
        assert!(!text.contains('€'));
    }

    #[test]
    fn test_cp1252_maps_c1_bytes_to_typographic_characters() {
        let cp1252_only = [("cp1252", TextDecoder::Windows1252)];
        let (text, encoding) = decode_with_fallback(b"A\n\x80\n", &cp1252_only).unwrap();
        assert_eq!(encoding, "cp1252");
        assert_eq!(text, "A\n€\n");
    }

    #[test]
    fn test_decoders_accept_and_reject() {
        assert_eq!(TextDecoder::Utf8.decode(b"\xE9"), None);
        assert_eq!(TextDecoder::Latin1.decode(b"\xE9").as_deref(), Some("é"));
        assert_eq!(TextDecoder::Windows1252.decode(b"\xE9").as_deref(), Some("é"));
    }

    #[test]
    fn test_malformed_rows_are_skipped_and_counted() {
        let text = "A,B,C\n1,2,3\n1,2,3,4\n5,6\n";
        let table = parse_delimited(text, "utf-8").unwrap();
        assert_eq!(table.report.rows_seen, 3);
        assert_eq!(table.report.skipped_rows, 1);
        assert_eq!(table.report.rows_loaded, 2);
        // Short row padded with a missing cell
        assert_eq!(table.rows[1], vec![Some("5".to_string()), Some("6".to_string()), None]);
    }

    #[test]
    fn test_quoted_thousands_survive_as_one_cell() {
        let text = "OOWNCODE,TOTALHOLDING\nA1,\"1,20,000\"\n";
        let table = parse_delimited(text, "utf-8").unwrap();
        assert_eq!(table.rows[0][1].as_deref(), Some("1,20,000"));
    }

    #[test]
    fn test_read_delimited_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"OOWNCODE,CITY\nA1,Pune\nA2,\n").unwrap();
        let table = read_delimited(file.path()).unwrap();
        assert_eq!(table.headers, vec!["OOWNCODE", "CITY"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][1], None);
        assert_eq!(table.report.encoding, Some("utf-8"));
    }
}
