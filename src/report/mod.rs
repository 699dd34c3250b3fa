// src/report/mod.rs - Markdown rendering and report output
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use log::debug;
use std::fs;
use std::path::Path;

use crate::models::stats_models::{LoadReport, NormalizationReport};
use crate::pipeline::derived::BinSpec;
use crate::utils::constants::UNKNOWN_MARKER;

pub mod client_report;
pub mod format;
pub mod partner_report;

/// Timestamp layout used in report headers and footers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One input table and what loading and normalizing it degraded.
pub struct SourceSummary<'s> {
    pub path: &'s Path,
    pub load: &'s LoadReport,
    pub normalization: &'s NormalizationReport,
}

impl SourceSummary<'_> {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Markdown bullets for every loader and normalizer degradation.
    pub fn quality_notes(&self) -> String {
        let load = self.load;
        let norm = self.normalization;
        let mut md = format!("**{}**\n\n", self.file_name());
        md.push_str(&format!(
            "- **Encoding:** {}\n",
            load.encoding.unwrap_or("spreadsheet")
        ));
        md.push_str(&format!(
            "- **Rows Read:** {} ({} malformed rows skipped)\n",
            format::count(load.rows_seen),
            format::count(load.skipped_rows)
        ));
        md.push_str(&format!(
            "- **Malformed Numeric Values (set to 0):** {}\n",
            format::count(norm.numeric_malformed)
        ));
        md.push_str(&format!(
            "- **Missing Numeric Values (set to 0):** {}\n",
            format::count(norm.numeric_missing)
        ));
        md.push_str(&format!(
            "- **Missing or Unparseable Dates:** {}\n",
            format::count(norm.dates_unknown)
        ));
        md.push_str(&format!(
            "- **Missing Categorical Values:** {}\n",
            format::count(norm.categorical_missing)
        ));
        md.push_str(&format!(
            "- **Duplicate Identifiers:** {}\n",
            format::count(norm.duplicate_identifiers)
        ));
        md.push_str(&format!(
            "- **Excluded for Negative Holdings:** {}\n",
            format::count(norm.negative_holdings_excluded)
        ));
        if !norm.absent_columns.is_empty() {
            md.push_str(&format!(
                "- **Columns Not Present:** {}\n",
                norm.absent_columns.join(", ")
            ));
        }
        md.push('\n');
        md
    }
}

/// Label of a bin index, or the unknown marker.
pub fn bin_label(bins: &BinSpec, bin: Option<usize>) -> &str {
    bin.map_or(UNKNOWN_MARKER, |i| bins.label(i))
}

/// Timestamp stamped on a report: `as_of` when given, otherwise the local
/// clock.
pub fn generation_time(as_of: Option<&str>) -> Result<NaiveDateTime> {
    match as_of {
        Some(raw) => NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .with_context(|| format!("'{}' is not a {} timestamp", raw, TIMESTAMP_FORMAT)),
        None => Ok(Local::now().naive_local()),
    }
}

/// Writes the rendered report, creating parent directories and replacing
/// any previous file. Returns the number of bytes written.
pub fn write_report(path: &Path, text: &str) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create report directory {}", parent.display())
            })?;
            debug!("Created report directory {}", parent.display());
        }
    }
    fs::write(path, text).with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(text.len())
}
