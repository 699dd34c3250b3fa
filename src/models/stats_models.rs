// src/models/stats_models.rs
use serde::Serialize;

/// Which profile a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Client,
    Partner,
}

impl ReportKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Client => "CLIENT",
            ReportKind::Partner => "PARTNER",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ReportKind::Client => "👥",
            ReportKind::Partner => "🤝",
        }
    }
}

/// What the loader saw while reading a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Data rows encountered after the header.
    pub rows_seen: usize,
    /// Rows kept in the table.
    pub rows_loaded: usize,
    /// Rows dropped for being malformed.
    pub skipped_rows: usize,
    /// Text encoding that decoded the file; `None` for spreadsheets.
    pub encoding: Option<&'static str>,
}

/// Recoverable degradations counted while normalizing records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    /// Numeric cells that were present but could not be parsed.
    pub numeric_malformed: usize,
    /// Numeric cells that were absent.
    pub numeric_missing: usize,
    /// Activation dates that were absent or unparseable.
    pub dates_unknown: usize,
    /// Categorical cells replaced by the unknown marker.
    pub categorical_missing: usize,
    /// Records sharing an identifier with an earlier record.
    pub duplicate_identifiers: usize,
    /// Records dropped because holdings were negative.
    pub negative_holdings_excluded: usize,
    /// Optional columns absent from the source header.
    pub absent_columns: Vec<String>,
}

impl NormalizationReport {
    pub fn total_degradations(&self) -> usize {
        self.numeric_malformed
            + self.dates_unknown
            + self.categorical_missing
            + self.duplicate_identifiers
            + self.negative_holdings_excluded
    }
}

/// Timing and output summary of one report run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub output_path: String,
    pub report_bytes: usize,
    pub records_analysed: usize,
    /// Phase name and wall time in seconds, in execution order.
    pub phase_times: Vec<(String, f64)>,
}

impl RunStats {
    pub fn record_phase(&mut self, phase: &str, seconds: f64) {
        self.phase_times.push((phase.to_string(), seconds));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_degradations_ignores_missing_numerics() {
        let report = NormalizationReport {
            numeric_malformed: 2,
            numeric_missing: 40,
            dates_unknown: 3,
            categorical_missing: 5,
            duplicate_identifiers: 1,
            negative_holdings_excluded: 1,
            absent_columns: Vec::new(),
        };
        assert_eq!(report.total_degradations(), 12);
    }

    #[test]
    fn test_report_kind_labels() {
        assert_eq!(ReportKind::Client.name(), "CLIENT");
        assert_eq!(ReportKind::Partner.name(), "PARTNER");
        assert_ne!(ReportKind::Client.emoji(), ReportKind::Partner.emoji());
    }
}
