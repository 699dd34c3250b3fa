// src/utils/progress_bars/logging.rs - Phase logging helpers for report runs
use crate::models::stats_models::{LoadReport, NormalizationReport, ReportKind, RunStats};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;

#[derive(Clone)]
pub struct PhaseLogger {
    report_name: &'static str,
    report_emoji: &'static str,
    start_time: Instant,
}

impl PhaseLogger {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            report_name: kind.name(),
            report_emoji: kind.emoji(),
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, input: &Path, output: &Path) {
        info!(
            "[{}] {} 🚀 Starting {} profile run",
            self.report_name,
            self.report_emoji,
            self.report_name.to_lowercase()
        );
        info!(
            "[{}] {} ⚙️  Input: {} → Output: {}",
            self.report_name,
            self.report_emoji,
            input.display(),
            output.display()
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.report_name, self.report_emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.report_name, self.report_emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_table_loaded(&self, source: &Path, load: &LoadReport) {
        info!(
            "[{}] {} 📊 Loaded {} rows from {} ({})",
            self.report_name,
            self.report_emoji,
            load.rows_loaded,
            source.display(),
            load.encoding.unwrap_or("spreadsheet")
        );
        if load.skipped_rows > 0 {
            warn!(
                "[{}] {} ⏭️  Skipped {} malformed rows out of {}",
                self.report_name, self.report_emoji, load.skipped_rows, load.rows_seen
            );
        }
    }

    pub fn log_normalization(&self, record_type: &str, kept: usize, report: &NormalizationReport) {
        info!(
            "[{}] {} ✅ Normalized {} {} records ({} excluded for negative holdings, {} degraded values)",
            self.report_name,
            self.report_emoji,
            kept,
            record_type,
            report.negative_holdings_excluded,
            report.total_degradations()
        );
        self.log_data_quality_issue(
            "malformed numeric values defaulted to zero",
            report.numeric_malformed,
        );
        self.log_data_quality_issue("unparseable activation dates", report.dates_unknown);
        self.log_data_quality_issue("duplicate record identifiers", report.duplicate_identifiers);
        debug!(
            "[{}] {} {} missing numeric values, {} missing categorical values",
            self.report_name,
            self.report_emoji,
            report.numeric_missing,
            report.categorical_missing
        );
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} instances of {}",
                self.report_name, self.report_emoji, count, issue_type
            );
        }
    }

    pub fn log_memory(&self, memory_mb: u64) {
        debug!(
            "[{}] {} 💾 Memory in use: {} MB",
            self.report_name, self.report_emoji, memory_mb
        );
    }

    pub fn log_completion(&self, stats: &RunStats) {
        info!(
            "[{}] {} 🎉 COMPLETED: {} bytes written to {} in {:.2?}",
            self.report_name,
            self.report_emoji,
            stats.report_bytes,
            stats.output_path,
            self.start_time.elapsed()
        );
        for (phase, seconds) in &stats.phase_times {
            info!(
                "[{}] {}   • {}: {:.2}s",
                self.report_name, self.report_emoji, phase, seconds
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.report_name, self.report_emoji, message);
    }
}
