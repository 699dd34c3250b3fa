// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

use crate::utils::get_memory_usage;

/// Configuration for progress tracking throughout a report run
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show a per-row bar while normalizing records
    pub detailed: bool,
    /// Whether to show memory usage in progress messages
    pub show_memory: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            detailed: env::var("PROGRESS_DETAILED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            show_memory: env::var("PROGRESS_SHOW_MEMORY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    /// Main bar counting report phases.
    pub fn phase_bar(&self, multi: Option<&MultiProgress>, phases: u64) -> Option<ProgressBar> {
        let mp = multi?;
        let pb = mp.add(ProgressBar::new(phases));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Initializing...");
        Some(pb)
    }

    /// Per-row bar used while normalizing, only when detailed progress is on.
    pub fn row_bar(
        &self,
        multi: Option<&MultiProgress>,
        rows: u64,
        label: &str,
    ) -> Option<ProgressBar> {
        if !self.should_show_detailed() {
            return None;
        }
        let mp = multi?;
        let pb = mp.add(ProgressBar::new(rows));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.blue} {prefix} [{bar:30.white/gray}] {pos}/{len} rows")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_prefix(label.to_string());
        Some(pb)
    }

    /// Marks a phase as done on the phase bar, with memory usage when enabled.
    pub fn advance_phase(&self, bar: Option<&ProgressBar>, phase: &str) {
        if let Some(pb) = bar {
            if self.should_show_memory() {
                pb.set_message(format!("{} (Memory: {} MB)", phase, get_memory_usage()));
            } else {
                pb.set_message(phase.to_string());
            }
            pb.inc(1);
        }
    }

    /// Check if detailed progress should be shown
    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    /// Check if memory usage should be shown
    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}
