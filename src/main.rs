use anyhow::{Context, Result};
use clap::Parser;
use client_profile_lib::analysis::client_analysis::analyze_clients;
use client_profile_lib::loading::load_table;
use client_profile_lib::models::stats_models::{ReportKind, RunStats};
use client_profile_lib::pipeline::normalizer::normalize_clients;
use client_profile_lib::report::client_report::render_client_report;
use client_profile_lib::report::{generation_time, write_report, SourceSummary};
use client_profile_lib::utils::config::AnalysisConfig;
use client_profile_lib::utils::env::load_env;
use client_profile_lib::utils::get_memory_usage;
use client_profile_lib::utils::progress_bars::logging::PhaseLogger;
use client_profile_lib::utils::progress_bars::progress_config::ProgressConfig;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

const PHASES: u64 = 5;

#[derive(Parser)]
#[command(author, version, about = "Profiles a brokerage client book into a markdown report", long_about = None)]
struct ClientProfileArgs {
    /// Client table to analyse (overrides CLIENT_CSV_PATH)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Where to write the report (overrides CLIENT_REPORT_PATH)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Generation timestamp printed in the report, "YYYY-MM-DD HH:MM:SS"
    #[arg(long)]
    as_of: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = ClientProfileArgs::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    load_env();

    let mut config = AnalysisConfig::from_env().context("Failed to read analysis configuration")?;
    if let Some(input) = args.input {
        config.client_csv_path = input;
    }
    if let Some(output) = args.output {
        config.client_report_path = output;
    }
    config.log_config();
    let generated_at = generation_time(args.as_of.as_deref())?;

    let logger = PhaseLogger::new(ReportKind::Client);
    logger.log_start(&config.client_csv_path, &config.client_report_path);

    let progress = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress.enabled, progress.detailed
    );
    let multi_progress = progress.create_multi_progress();
    let main_pb = progress.phase_bar(multi_progress.as_ref(), PHASES);
    let mut stats = RunStats {
        output_path: config.client_report_path.display().to_string(),
        ..Default::default()
    };

    // Phase 1: load
    logger.log_phase("Loading client table", None);
    let phase_start = Instant::now();
    let table = load_table(&config.client_csv_path).with_context(|| {
        format!("Failed to load client table {}", config.client_csv_path.display())
    })?;
    logger.log_table_loaded(&config.client_csv_path, &table.report);
    stats.record_phase("load", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Client table loaded");

    // Phase 2: normalize
    logger.log_phase("Normalizing client records", None);
    let phase_start = Instant::now();
    let row_pb = progress.row_bar(multi_progress.as_ref(), table.len() as u64, "clients");
    let (records, normalization) = normalize_clients(&table, row_pb.as_ref())?;
    if let Some(pb) = row_pb {
        pb.finish_and_clear();
    }
    logger.log_normalization("client", records.len(), &normalization);
    if records.is_empty() {
        logger.log_warning("No client records left after normalization; the report will be empty");
    }
    stats.record_phase("normalize", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Client records normalized");

    // Phase 3: aggregate and rank
    logger.log_phase("Analysing client book", None);
    let phase_start = Instant::now();
    let analysis = analyze_clients(&records, &config);
    stats.records_analysed = records.len();
    stats.record_phase("analyse", phase_start.elapsed().as_secs_f64());
    if progress.should_show_memory() {
        logger.log_memory(get_memory_usage());
    }
    progress.advance_phase(main_pb.as_ref(), "Client book analysed");

    // Phase 4: render
    logger.log_phase("Rendering report", None);
    let phase_start = Instant::now();
    let source = SourceSummary {
        path: &config.client_csv_path,
        load: &table.report,
        normalization: &normalization,
    };
    let report = render_client_report(&analysis, &config, &source, generated_at);
    stats.record_phase("render", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Report rendered");

    // Phase 5: write
    logger.log_phase("Writing report", Some(stats.output_path.as_str()));
    let phase_start = Instant::now();
    stats.report_bytes = write_report(&config.client_report_path, &report)?;
    stats.record_phase("write", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Report written");

    if let Some(pb) = main_pb {
        pb.finish_with_message("Client profile complete");
    }
    logger.log_completion(&stats);
    Ok(())
}
