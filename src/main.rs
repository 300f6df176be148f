//! DDoS Flow Analyzer
//!
//! This is the main entry point for the flow analyzer. It loads the
//! configuration, ingests a flow log file (whole or in streamed batches),
//! runs the detection engine, and renders the ranked report.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{debug, info, warn};

use ddos_flow_analyzer::config::load_config;
use ddos_flow_analyzer::core::{
    read_flow_file, DdosDetector, LlmClient, StreamingReader, WindowGrouper,
};
use ddos_flow_analyzer::report::{self, ReportFormat};

#[derive(Parser, Debug)]
#[command(name = "ddos_flow_analyzer")]
#[command(version)]
#[command(about = "Rule-based DDoS detection for network flow logs")]
struct Args {
    /// Flow log file (CSV) to analyze
    input: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Write the rendered report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    format: ReportFormat,

    /// Read the input in batches instead of materializing it
    #[arg(long)]
    streaming: bool,

    /// Records per batch in streaming mode
    #[arg(long)]
    batch_size: Option<usize>,

    /// Request LLM commentary for the top flagged windows
    #[arg(long)]
    explain: bool,

    /// Number of flagged windows to explain
    #[arg(long, default_value = "3")]
    explain_top: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if args.verbose { "debug" } else { "info" },
    ))
    .init();

    info!("Starting DDoS flow analysis...");

    // Load configuration
    let mut config =
        load_config(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(batch_size) = args.batch_size {
        ensure!(batch_size > 0, "--batch-size must be positive");
        config.stream.batch_size = batch_size;
    }

    // Fail fast on bad detection patterns before touching the input
    let detector = DdosDetector::new(config.detection.clone())
        .context("invalid suspicious-source pattern in configuration")?;

    // Ingest
    let mut grouper = WindowGrouper::new(&config.detection);
    let rejected = if args.streaming {
        let mut reader = StreamingReader::open(
            &args.input,
            &config.columns,
            config.stream.batch_size,
        )?;
        let mut batches = 0usize;
        while let Some(batch) = reader.next_batch()? {
            batches += 1;
            debug!("batch {}: {} records", batches, batch.len());
            grouper.ingest(&batch);
        }
        info!(
            "streamed {} rows in {} batches ({} rejected)",
            reader.rows_read(),
            batches,
            reader.rejected_rows()
        );
        reader.rejected_rows()
    } else {
        let (records, rejected) = read_flow_file(&args.input, &config.columns)?;
        grouper.ingest(&records);
        rejected
    };
    if rejected > 0 {
        warn!("{} rows were skipped as invalid", rejected);
    }
    info!("accumulated {} windows", grouper.len());

    // Score and rank
    let result = detector.analyze(&grouper.finalize());

    // Render
    match &args.output {
        Some(path) => report::save_report(&result, args.format, path)?,
        None => println!("{}", report::render(&result, args.format)?),
    }

    // Optional LLM commentary, never fatal to the run
    if args.explain {
        match LlmClient::new(config.llm.clone()) {
            Ok(client) => {
                for window in result.flagged.iter().take(args.explain_top) {
                    match client.explain(window).await {
                        Ok(text) => {
                            println!(
                                "\nAnalyst commentary for {} (window {}):\n{}",
                                window.source, window.window_index, text
                            );
                        }
                        Err(e) => {
                            warn!("explanation for {} failed: {}", window.source, e)
                        }
                    }
                }
            }
            Err(e) => warn!("LLM explanations disabled: {}", e),
        }
    }

    Ok(())
}
