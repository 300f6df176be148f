//! Label-driven detection for the DDoS flow analyzer.
//!
//! Ground-truth labels, when the input carries them, are scored separately
//! from the unsupervised suspicion rules so the two overlays can be tested
//! and tuned independently. The flagging stage composes both.

use crate::core::grouper::WindowAggregate;
use crate::core::normalizer::UNKNOWN;
use crate::core::rules::Indicator;
use crate::core::DetectionConfig;

/// Risk weight added for each distinct known-attack label in a window
pub const ATTACK_LABEL_WEIGHT: u32 = 5;

/// Benign ground-truth label; counts as non-attack for statistics
pub const BENIGN_LABEL: &str = "benign";

/// Outcome of evaluating one window's label set
#[derive(Debug, Default)]
pub struct LabelVerdict {
    /// One indicator per distinct matching label, no deduplication across labels
    pub indicators: Vec<Indicator>,
    /// Distinct labels in this window that are neither benign nor the sentinel.
    /// Statistics only; contributes no risk.
    pub labeled_attack_entries: u64,
    /// Number of label-driven risk increments
    pub known_attack_hits: u64,
}

/// Evaluate the supervised overlay for one window.
///
/// A label adds [`ATTACK_LABEL_WEIGHT`] when it exactly matches a configured
/// known-attack label (case-insensitive) or contains the configured attack
/// family marker. A window with several distinct matching labels accumulates
/// one increment per label.
pub fn evaluate_labels(window: &WindowAggregate, config: &DetectionConfig) -> LabelVerdict {
    let marker = config.attack_family_marker.trim().to_lowercase();
    let mut verdict = LabelVerdict::default();

    for label in &window.labels {
        let normalized = label.trim().to_lowercase();
        if normalized.is_empty() || normalized == UNKNOWN {
            continue;
        }

        if normalized != BENIGN_LABEL {
            verdict.labeled_attack_entries += 1;
        }

        let exact_match = config
            .known_attack_labels
            .iter()
            .any(|known| known.trim().to_lowercase() == normalized);
        let family_match = !marker.is_empty() && normalized.contains(&marker);

        if exact_match || family_match {
            verdict.known_attack_hits += 1;
            verdict.indicators.push(Indicator {
                rule_id: "known_attack_label".to_string(),
                message: format!("Known attack label detected: {}", label),
                weight: ATTACK_LABEL_WEIGHT,
            });
        }
    }

    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grouper::WindowGrouper;
    use crate::core::normalizer::LogRecord;

    fn labeled_record(label: &str) -> LogRecord {
        LogRecord {
            timestamp: 100,
            source: "203.0.113.5".to_string(),
            destination: "198.51.100.7".to_string(),
            request_count: 1,
            flow_duration: 0.0,
            byte_count: 0.0,
            label: label.to_string(),
            user_agent: UNKNOWN.to_string(),
            response_code: UNKNOWN.to_string(),
            method: UNKNOWN.to_string(),
            path: UNKNOWN.to_string(),
        }
    }

    fn window_with_labels(labels: &[&str]) -> WindowAggregate {
        let config = DetectionConfig::default();
        let mut grouper = WindowGrouper::new(&config);
        let records: Vec<LogRecord> =
            labels.iter().map(|l| labeled_record(l)).collect();
        grouper.ingest(&records);
        grouper.finalize().into_values().next().unwrap()
    }

    #[test]
    fn test_known_attack_label_scores_once_per_distinct_label() {
        let config = DetectionConfig::default();
        // Repeated records of the same label collapse into one distinct label
        let window = window_with_labels(&["DrDoS_DNS", "DrDoS_DNS", "drdos_ntp"]);
        let verdict = evaluate_labels(&window, &config);

        assert_eq!(verdict.known_attack_hits, 2);
        assert_eq!(verdict.indicators.len(), 2);
        assert!(verdict
            .indicators
            .iter()
            .all(|i| i.weight == ATTACK_LABEL_WEIGHT));
    }

    #[test]
    fn test_family_marker_containment_matches() {
        let config = DetectionConfig::default();
        // Not in the exact label list, but contains the "drdos" family marker
        let window = window_with_labels(&["DrDoS_Portmap"]);
        let verdict = evaluate_labels(&window, &config);

        assert_eq!(verdict.known_attack_hits, 1);
        assert!(verdict.indicators[0].message.contains("DrDoS_Portmap"));
    }

    #[test]
    fn test_benign_and_sentinel_do_not_score_or_count() {
        let config = DetectionConfig::default();
        let window = window_with_labels(&["BENIGN"]);
        let verdict = evaluate_labels(&window, &config);

        assert_eq!(verdict.known_attack_hits, 0);
        assert_eq!(verdict.labeled_attack_entries, 0);
        assert!(verdict.indicators.is_empty());
    }

    #[test]
    fn test_non_benign_label_counts_for_stats_without_scoring() {
        let config = DetectionConfig::default();
        // A labeled attack the rule set knows nothing about
        let window = window_with_labels(&["PortScan"]);
        let verdict = evaluate_labels(&window, &config);

        assert_eq!(verdict.labeled_attack_entries, 1);
        assert_eq!(verdict.known_attack_hits, 0);
        assert!(verdict.indicators.is_empty());
    }
}
