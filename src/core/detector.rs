//! Flagging and ranking for the DDoS flow analyzer.
//!
//! This module composes the unsupervised rule engine with the label-driven
//! overlay, flags windows whose accumulated risk crosses the reporting
//! threshold, and produces the ranked result with run-wide statistics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use uuid::Uuid;

use crate::core::grouper::{WindowAggregate, WindowKey};
use crate::core::labels::evaluate_labels;
use crate::core::normalizer::LogRecord;
use crate::core::rules::{standard_rules, Indicator, RuleContext, RuleDef};
use crate::core::DetectionConfig;

/// Minimum total risk score required for a window to be reported.
/// A single weak one-point indicator is never reported on its own.
pub const MIN_FLAG_SCORE: u32 = 2;

/// Number of contributing records retained on a flagged window for audit
pub const SAMPLE_RECORDS: usize = 5;

/// A window whose accumulated risk crossed the flagging threshold
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedWindow {
    /// Source address
    pub source: String,
    /// Window index within the run
    pub window_index: i64,
    /// When this entry was generated
    pub detected_at: DateTime<Utc>,
    /// Total request count accumulated in the window
    pub total_requests: u64,
    /// Requests per configured window-minute
    pub request_frequency: f64,
    /// Sum of all fired indicator weights
    pub risk_score: u32,
    /// Explanations of every indicator that fired, in evaluation order
    pub indicators: Vec<String>,
    /// Distinct request paths seen
    pub unique_paths: usize,
    /// Distinct user agents seen
    pub unique_user_agents: usize,
    /// Response code -> cumulative request count
    pub response_codes: BTreeMap<String, u64>,
    /// HTTP method -> cumulative request count
    pub methods: BTreeMap<String, u64>,
    /// Distinct labels seen
    pub labels: Vec<String>,
    /// Whether a configured known-DDoS label was seen
    pub known_attack: bool,
    /// First few contributing records, in encounter order
    pub sample_records: Vec<LogRecord>,
}

/// Run-wide counters, read-only after the run completes
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStats {
    /// Valid records that entered grouping
    pub total_records: u64,
    /// Distinct source addresses observed
    pub unique_sources: u64,
    /// Windows evaluated
    pub windows_analyzed: u64,
    /// Windows that crossed the flagging threshold
    pub flagged_windows: u64,
    /// Fire count per rule identifier
    pub rule_triggers: BTreeMap<String, u64>,
    /// Distinct non-benign ground-truth labels across windows
    pub labeled_attack_entries: u64,
    /// Label-driven risk increments across windows
    pub known_attack_hits: u64,
}

/// The ranked analysis output handed to reporting collaborators
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Identifier for this analysis run
    pub run_id: String,
    /// When the run completed
    pub generated_at: DateTime<Utc>,
    /// Flagged windows, ranked by descending risk
    pub flagged: Vec<FlaggedWindow>,
    /// Run-wide statistics
    pub stats: AnalysisStats,
    /// Echo of the effective detection configuration
    pub config: DetectionConfig,
}

/// Scores window aggregates and assembles the ranked result
pub struct DdosDetector {
    rules: Vec<RuleDef>,
    context: RuleContext,
}

impl DdosDetector {
    /// Create a detector for one run.
    ///
    /// Fails if a configured suspicious-source pattern is not a valid regex.
    pub fn new(config: DetectionConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: standard_rules(),
            context: RuleContext::new(config)?,
        })
    }

    /// Score every window and produce the ranked, flagged result.
    ///
    /// Ties in risk score are broken by source address then window index,
    /// so the ranking is reproducible across runs.
    pub fn analyze(
        &self,
        windows: &BTreeMap<WindowKey, WindowAggregate>,
    ) -> AnalysisResult {
        let config = &self.context.config;
        let mut stats = AnalysisStats::default();
        let mut sources: BTreeSet<&str> = BTreeSet::new();
        let mut flagged = Vec::new();

        for window in windows.values() {
            stats.total_records += window.records.len() as u64;
            stats.windows_analyzed += 1;
            sources.insert(window.source.as_str());

            // Divisor is the configured window length, not the observed
            // span of the window's records.
            let frequency =
                window.total_requests as f64 / f64::from(config.window_minutes);

            let mut indicators: Vec<Indicator> = self
                .rules
                .iter()
                .filter_map(|rule| rule.evaluate(window, frequency, &self.context))
                .collect();

            let labels = evaluate_labels(window, config);
            stats.labeled_attack_entries += labels.labeled_attack_entries;
            stats.known_attack_hits += labels.known_attack_hits;
            indicators.extend(labels.indicators);

            for indicator in &indicators {
                *stats
                    .rule_triggers
                    .entry(indicator.rule_id.clone())
                    .or_insert(0) += 1;
            }

            let risk_score: u32 = indicators.iter().map(|i| i.weight).sum();
            debug!(
                "window {}@{}: {} requests, {:.1} req/min, risk {}",
                window.source,
                window.window_index,
                window.total_requests,
                frequency,
                risk_score
            );

            if risk_score >= MIN_FLAG_SCORE {
                stats.flagged_windows += 1;
                flagged.push(build_flagged(window, frequency, risk_score, indicators));
            }
        }
        stats.unique_sources = sources.len() as u64;

        flagged.sort_by(|a, b| {
            b.risk_score
                .cmp(&a.risk_score)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.window_index.cmp(&b.window_index))
        });

        info!(
            "analyzed {} windows from {} sources, flagged {}",
            stats.windows_analyzed, stats.unique_sources, stats.flagged_windows
        );

        AnalysisResult {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            flagged,
            stats,
            config: config.clone(),
        }
    }
}

fn build_flagged(
    window: &WindowAggregate,
    frequency: f64,
    risk_score: u32,
    indicators: Vec<Indicator>,
) -> FlaggedWindow {
    FlaggedWindow {
        source: window.source.clone(),
        window_index: window.window_index,
        detected_at: Utc::now(),
        total_requests: window.total_requests,
        request_frequency: frequency,
        risk_score,
        indicators: indicators.into_iter().map(|i| i.message).collect(),
        unique_paths: window.paths.len(),
        unique_user_agents: window.user_agents.len(),
        response_codes: window.response_codes.clone(),
        methods: window.methods.clone(),
        labels: window.labels.iter().cloned().collect(),
        known_attack: window.known_attack,
        sample_records: window
            .records
            .iter()
            .take(SAMPLE_RECORDS)
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grouper::WindowGrouper;
    use crate::core::normalizer::UNKNOWN;

    fn record(timestamp: i64, source: &str) -> LogRecord {
        LogRecord {
            timestamp,
            source: source.to_string(),
            destination: "198.51.100.7".to_string(),
            request_count: 1,
            flow_duration: 0.0,
            byte_count: 0.0,
            label: UNKNOWN.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            response_code: UNKNOWN.to_string(),
            method: UNKNOWN.to_string(),
            path: "/".to_string(),
        }
    }

    fn analyze(records: Vec<LogRecord>) -> AnalysisResult {
        let config = DetectionConfig::default();
        let mut grouper = WindowGrouper::new(&config);
        grouper.ingest(&records);
        let detector = DdosDetector::new(config).unwrap();
        detector.analyze(&grouper.finalize())
    }

    #[test]
    fn test_curl_flood_scenario() {
        // 120 records in one 5-minute window with a curl user agent:
        // 24 req/min stays under the frequency bands, so only the
        // user-agent rule (weight 2) fires.
        let records: Vec<LogRecord> = (0..120)
            .map(|i| {
                let mut r = record(i, "203.0.113.5");
                r.user_agent = "curl/7.68".to_string();
                r
            })
            .collect();

        let result = analyze(records);
        assert_eq!(result.flagged.len(), 1);
        let flagged = &result.flagged[0];
        assert_eq!(flagged.total_requests, 120);
        assert_eq!(flagged.request_frequency, 24.0);
        assert_eq!(flagged.risk_score, 2);
        assert_eq!(flagged.indicators.len(), 1);
        assert!(flagged.indicators[0].contains("curl"));
    }

    #[test]
    fn test_high_frequency_scenario() {
        // 600 requests in one 5-minute window = 120 req/min; only the
        // high-frequency rule fires.
        let records: Vec<LogRecord> = (0..600)
            .map(|i| record(i % 300, "203.0.113.5"))
            .collect();

        let result = analyze(records);
        assert_eq!(result.flagged.len(), 1);
        let flagged = &result.flagged[0];
        assert_eq!(flagged.request_frequency, 120.0);
        assert_eq!(flagged.risk_score, 3);
        assert_eq!(flagged.indicators.len(), 1);
        assert_eq!(result.stats.rule_triggers["high_frequency"], 1);
    }

    #[test]
    fn test_frequency_is_exact_for_configured_window() {
        // 500 requests over a 5-minute configured window: exactly 100 req/min
        let records: Vec<LogRecord> = (0..500)
            .map(|i| record(i % 299, "203.0.113.5"))
            .collect();

        let result = analyze(records);
        assert_eq!(result.flagged[0].request_frequency, 100.0);
    }

    #[test]
    fn test_score_of_one_is_never_flagged() {
        // Loopback source fires the one-point source rule and nothing else
        let records = vec![record(0, "127.0.0.1")];
        let result = analyze(records);

        assert!(result.flagged.is_empty());
        assert_eq!(result.stats.rule_triggers["suspicious_source"], 1);
        // Still counted toward run statistics
        assert_eq!(result.stats.total_records, 1);
        assert_eq!(result.stats.windows_analyzed, 1);
    }

    #[test]
    fn test_score_of_two_is_always_flagged() {
        // Loopback source (1) + suspicious method tally (1) = exactly 2
        let mut rec = record(0, "127.0.0.1");
        rec.method = "TRACE".to_string();
        let result = analyze(vec![rec]);

        assert_eq!(result.flagged.len(), 1);
        assert_eq!(result.flagged[0].risk_score, MIN_FLAG_SCORE);
    }

    #[test]
    fn test_benign_window_counts_in_stats_but_not_output() {
        let mut rec = record(0, "203.0.113.5");
        rec.label = "BENIGN".to_string();
        let result = analyze(vec![rec]);

        assert!(result.flagged.is_empty());
        assert_eq!(result.stats.total_records, 1);
        assert_eq!(result.stats.labeled_attack_entries, 0);
    }

    #[test]
    fn test_known_attack_label_weight_and_flag() {
        let mut rec = record(0, "203.0.113.5");
        rec.label = "DrDoS_DNS".to_string();
        let result = analyze(vec![rec]);

        assert_eq!(result.flagged.len(), 1);
        let flagged = &result.flagged[0];
        assert!(flagged.known_attack);
        assert_eq!(flagged.risk_score, 5);
        assert_eq!(result.stats.known_attack_hits, 1);
        assert_eq!(result.stats.rule_triggers["known_attack_label"], 1);
    }

    #[test]
    fn test_ranking_is_deterministic_with_tiebreak() {
        // Three sources with identical risk profiles plus one stronger one
        let mut records = Vec::new();
        for source in ["9.9.9.9", "2.2.2.2", "5.5.5.5"] {
            for i in 0..120 {
                let mut r = record(i, source);
                r.user_agent = "curl/7.68".to_string();
                records.push(r);
            }
        }
        for i in 0..600 {
            records.push(record(i % 300, "8.8.8.8"));
        }

        let result = analyze(records);
        let order: Vec<&str> =
            result.flagged.iter().map(|f| f.source.as_str()).collect();
        // Highest risk first, then ties by ascending source address
        assert_eq!(order, vec!["8.8.8.8", "2.2.2.2", "5.5.5.5", "9.9.9.9"]);
    }

    #[test]
    fn test_sample_records_are_bounded() {
        let records: Vec<LogRecord> = (0..120)
            .map(|i| {
                let mut r = record(i, "203.0.113.5");
                r.user_agent = "python-requests/2.28".to_string();
                r
            })
            .collect();

        let result = analyze(records);
        assert_eq!(result.flagged[0].sample_records.len(), SAMPLE_RECORDS);
        // Encounter order retained
        assert_eq!(result.flagged[0].sample_records[0].timestamp, 0);
        assert_eq!(result.flagged[0].sample_records[4].timestamp, 4);
    }

    #[test]
    fn test_batch_split_independence_of_results() {
        let config = DetectionConfig::default();
        let records: Vec<LogRecord> = (0..450)
            .map(|i| {
                let mut r = record(
                    i * 2,
                    if i % 2 == 0 { "203.0.113.5" } else { "127.0.0.1" },
                );
                if i % 3 == 0 {
                    r.user_agent = "curl/7.68".to_string();
                }
                r
            })
            .collect();

        let detector = DdosDetector::new(config.clone()).unwrap();

        let mut whole = WindowGrouper::new(&config);
        whole.ingest(&records);
        let whole = detector.analyze(&whole.finalize());

        let mut batched = WindowGrouper::new(&config);
        for chunk in records.chunks(37) {
            batched.ingest(chunk);
        }
        let batched = detector.analyze(&batched.finalize());

        assert_eq!(whole.flagged.len(), batched.flagged.len());
        for (a, b) in whole.flagged.iter().zip(&batched.flagged) {
            assert_eq!(a.source, b.source);
            assert_eq!(a.window_index, b.window_index);
            assert_eq!(a.risk_score, b.risk_score);
            assert_eq!(a.indicators, b.indicators);
        }
        assert_eq!(whole.stats.total_records, batched.stats.total_records);
        assert_eq!(whole.stats.rule_triggers, batched.stats.rule_triggers);
    }

    #[test]
    fn test_result_echoes_configuration() {
        let result = analyze(vec![record(0, "203.0.113.5")]);
        assert_eq!(result.config.window_minutes, 5);
        assert_eq!(result.config.high_freq_threshold, 100.0);
        assert!(!result.run_id.is_empty());
    }
}
