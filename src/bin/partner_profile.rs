use anyhow::{Context, Result};
use clap::Parser;
use client_profile_lib::analysis::partner_analysis::analyze_partners;
use client_profile_lib::loading::load_table;
use client_profile_lib::models::stats_models::{ReportKind, RunStats};
use client_profile_lib::pipeline::normalizer::{normalize_clients, normalize_partners};
use client_profile_lib::report::partner_report::render_partner_report;
use client_profile_lib::report::{generation_time, write_report, SourceSummary};
use client_profile_lib::utils::config::AnalysisConfig;
use client_profile_lib::utils::env::load_env;
use client_profile_lib::utils::get_memory_usage;
use client_profile_lib::utils::progress_bars::logging::PhaseLogger;
use client_profile_lib::utils::progress_bars::progress_config::ProgressConfig;
use std::path::PathBuf;
use std::time::Instant;

const PHASES: u64 = 5;

#[derive(Parser)]
#[command(author, version, about = "Profiles partner books joined with their clients", long_about = None)]
struct PartnerProfileArgs {
    /// Client table (overrides CLIENT_CSV_PATH)
    #[arg(long)]
    clients: Option<PathBuf>,

    /// Partner sheet (overrides PARTNER_SHEET_PATH)
    #[arg(long)]
    partners: Option<PathBuf>,

    /// Where to write the report (overrides PARTNER_REPORT_PATH)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Generation timestamp printed in the report, "YYYY-MM-DD HH:MM:SS"
    #[arg(long)]
    as_of: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = PartnerProfileArgs::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    load_env();

    let mut config = AnalysisConfig::from_env().context("Failed to read analysis configuration")?;
    if let Some(path) = args.clients {
        config.client_csv_path = path;
    }
    if let Some(path) = args.partners {
        config.partner_sheet_path = path;
    }
    if let Some(path) = args.output {
        config.partner_report_path = path;
    }
    config.log_config();
    let generated_at = generation_time(args.as_of.as_deref())?;

    let logger = PhaseLogger::new(ReportKind::Partner);
    logger.log_start(&config.partner_sheet_path, &config.partner_report_path);

    let progress = ProgressConfig::from_env();
    let multi_progress = progress.create_multi_progress();
    let main_pb = progress.phase_bar(multi_progress.as_ref(), PHASES);
    let mut stats = RunStats {
        output_path: config.partner_report_path.display().to_string(),
        ..Default::default()
    };

    // Phase 1: load both tables before doing any work
    logger.log_phase("Loading client and partner tables", None);
    let phase_start = Instant::now();
    let client_table = load_table(&config.client_csv_path).with_context(|| {
        format!("Failed to load client table {}", config.client_csv_path.display())
    })?;
    logger.log_table_loaded(&config.client_csv_path, &client_table.report);
    let partner_table = load_table(&config.partner_sheet_path).with_context(|| {
        format!("Failed to load partner sheet {}", config.partner_sheet_path.display())
    })?;
    logger.log_table_loaded(&config.partner_sheet_path, &partner_table.report);
    stats.record_phase("load", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Tables loaded");

    // Phase 2: normalize
    logger.log_phase("Normalizing records", None);
    let phase_start = Instant::now();
    let row_pb = progress.row_bar(multi_progress.as_ref(), client_table.len() as u64, "clients");
    let (clients, client_normalization) = normalize_clients(&client_table, row_pb.as_ref())?;
    if let Some(pb) = row_pb {
        pb.finish_and_clear();
    }
    logger.log_normalization("client", clients.len(), &client_normalization);
    let (partners, partner_normalization) = normalize_partners(&partner_table)?;
    logger.log_normalization("partner", partners.len(), &partner_normalization);
    if partners.is_empty() {
        logger.log_warning("Partner sheet has no rows; the report will be empty");
    }
    stats.record_phase("normalize", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Records normalized");

    // Phase 3: join and aggregate
    logger.log_phase("Joining partners with client metrics", None);
    let phase_start = Instant::now();
    let analysis = analyze_partners(&clients, &partners, &config);
    stats.records_analysed = partners.len();
    logger.log_phase(
        "Join complete",
        Some(&format!(
            "{} of {} partners have categorised clients",
            analysis.overview.partners_with_clients, analysis.overview.total_partners
        )),
    );
    stats.record_phase("analyse", phase_start.elapsed().as_secs_f64());
    if progress.should_show_memory() {
        logger.log_memory(get_memory_usage());
    }
    progress.advance_phase(main_pb.as_ref(), "Partner books analysed");

    // Phase 4: render
    logger.log_phase("Rendering report", None);
    let phase_start = Instant::now();
    let client_source = SourceSummary {
        path: &config.client_csv_path,
        load: &client_table.report,
        normalization: &client_normalization,
    };
    let partner_source = SourceSummary {
        path: &config.partner_sheet_path,
        load: &partner_table.report,
        normalization: &partner_normalization,
    };
    let report = render_partner_report(
        &analysis,
        &config,
        &client_source,
        &partner_source,
        generated_at,
    );
    stats.record_phase("render", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Report rendered");

    // Phase 5: write
    logger.log_phase("Writing report", Some(stats.output_path.as_str()));
    let phase_start = Instant::now();
    stats.report_bytes = write_report(&config.partner_report_path, &report)?;
    stats.record_phase("write", phase_start.elapsed().as_secs_f64());
    progress.advance_phase(main_pb.as_ref(), "Report written");

    if let Some(pb) = main_pb {
        pb.finish_with_message("Partner profile complete");
    }
    logger.log_completion(&stats);
    Ok(())
}
