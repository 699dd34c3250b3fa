// src/loading/mod.rs - Tabular input for the profiling pipeline
pub mod csv_loader;
pub mod excel_loader;

use anyhow::Result;
use std::path::Path;

use crate::models::stats_models::LoadReport;

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// A source table as read from disk: header names plus rows of optional
/// cells. Empty cells are `None`; no typing has happened yet.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub report: LoadReport,
}

impl RawTable {
    /// Position of the first header matching any of `aliases`,
    /// ignoring case and surrounding whitespace.
    pub fn resolve(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            self.headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias))
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads `path` as a spreadsheet when the extension says so, otherwise as
/// delimited text with encoding fallback.
pub fn load_table(path: &Path) -> Result<RawTable> {
    let is_spreadsheet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false);

    if is_spreadsheet {
        excel_loader::read_spreadsheet(path)
    } else {
        csv_loader::read_delimited(path)
    }
}

/// Normalizes a raw cell: whitespace-only cells count as missing.
pub(crate) fn to_cell(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
