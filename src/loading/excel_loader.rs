// src/loading/excel_loader.rs
use anyhow::{anyhow, bail, Result};
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info};
use std::path::Path;

use super::{to_cell, RawTable};
use crate::models::stats_models::LoadReport;

/// Reads the first sheet of a workbook; the first row is the header.
/// Fully blank rows are ignored. The table is as wide as the last named
/// header; rows are padded or truncated to that width.
pub fn read_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| anyhow!("Could not open spreadsheet {}: {}", path.display(), e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Spreadsheet {} has no sheets", path.display()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| {
            anyhow!("Could not read sheet '{}' of {}: {}", sheet_name, path.display(), e)
        })?;

    let mut sheet_rows = range.rows();
    let mut headers: Vec<String> = match sheet_rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default().trim().to_string())
            .collect(),
        None => bail!("Sheet '{}' of {} is empty", sheet_name, path.display()),
    };
    // The range is as wide as its widest row; unnamed trailing columns are dropped.
    let width = headers.iter().rposition(|h| !h.is_empty()).map_or(0, |i| i + 1);
    if width == 0 {
        bail!("Sheet '{}' of {} has no header row", sheet_name, path.display());
    }
    headers.truncate(width);

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for row in sheet_rows {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        report.rows_seen += 1;
        let mut cells: Vec<Option<String>> = row.iter().map(cell_text).collect();
        cells.resize(headers.len(), None);
        rows.push(cells);
    }
    report.rows_loaded = rows.len();

    info!(
        "✓ Read {} rows from sheet '{}' of {}",
        report.rows_loaded,
        sheet_name,
        path.display()
    );
    debug!("Spreadsheet headers: {:?}", headers);

    Ok(RawTable {
        headers,
        rows,
        report,
    })
}

/// Text form of a cell; error and empty cells are missing.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => to_cell(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use simple_excel_writer::{Row, Workbook};
    use std::path::Path;

    /// Writes `rows` to the first sheet of a new workbook at `path`.
    /// An empty row leaves a blank line in the sheet.
    pub fn write_workbook(path: &Path, rows: &[&[&str]]) {
        let mut workbook = Workbook::create(path.to_str().unwrap());
        let mut sheet = workbook.create_sheet("Partners");
        workbook
            .write_sheet(&mut sheet, |sheet_writer| {
                for row in rows {
                    if row.is_empty() {
                        sheet_writer.append_blank_rows(1);
                    } else {
                        sheet_writer.append_row(Row::from_iter(row.iter().cloned()))?;
                    }
                }
                Ok(())
            })
            .unwrap();
        workbook.close().unwrap();
    }
}
