//! Report rendering for the DDoS flow analyzer.
//!
//! This module renders an [`AnalysisResult`] as human-readable text or
//! JSON and optionally persists the rendering to a file. It is a pure
//! consumer of the analysis output.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::info;

use crate::core::detector::AnalysisResult;

/// Output rendering for analysis results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text report
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Render a result in the requested format
pub fn render(result: &AnalysisResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(result)),
        ReportFormat::Json => {
            serde_json::to_string_pretty(result).context("failed to serialize results")
        }
    }
}

/// Render the human-readable text report
pub fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let stats = &result.stats;

    let _ = writeln!(out, "DDoS Flow Analysis Report");
    let _ = writeln!(out, "=========================");
    let _ = writeln!(out, "Run:       {}", result.run_id);
    let _ = writeln!(
        out,
        "Generated: {}",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Window:    {} min (high >= {:.0} req/min, medium >= {:.0} req/min)",
        result.config.window_minutes,
        result.config.high_freq_threshold,
        result.config.medium_freq_threshold
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Records analyzed:      {}", stats.total_records);
    let _ = writeln!(out, "Distinct sources:      {}", stats.unique_sources);
    let _ = writeln!(out, "Windows analyzed:      {}", stats.windows_analyzed);
    let _ = writeln!(out, "Windows flagged:       {}", stats.flagged_windows);
    let _ = writeln!(out, "Labeled attack labels: {}", stats.labeled_attack_entries);
    if !stats.rule_triggers.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Rule triggers:");
        for (rule, count) in &stats.rule_triggers {
            let _ = writeln!(out, "  {:<28} {}", rule, count);
        }
    }

    if result.flagged.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "No suspicious windows detected.");
        return out;
    }

    for (rank, window) in result.flagged.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "#{} {} (window {}) - risk {}{}",
            rank + 1,
            window.source,
            window.window_index,
            window.risk_score,
            if window.known_attack {
                " [known attack]"
            } else {
                ""
            }
        );
        let _ = writeln!(
            out,
            "   {} requests, {:.1} req/min, {} paths, {} user agents",
            window.total_requests,
            window.request_frequency,
            window.unique_paths,
            window.unique_user_agents
        );
        if !window.labels.is_empty() {
            let _ = writeln!(out, "   labels: {}", window.labels.join(", "));
        }
        for indicator in &window.indicators {
            let _ = writeln!(out, "   - {}", indicator);
        }
    }

    out
}

/// Write the rendered report to a file
pub fn save_report(
    result: &AnalysisResult,
    format: ReportFormat,
    path: &Path,
) -> Result<()> {
    let rendered = render(result, format)?;
    fs::write(path, rendered)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    info!("report saved to {}", path.display());
    Ok(())
}
