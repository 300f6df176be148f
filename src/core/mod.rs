//! Core functionality for the DDoS flow analyzer.
//!
//! This module contains the core components of the analysis pipeline:
//! record normalization, time-window grouping, the suspicion rule engine,
//! label-driven detection, flagging and ranking, and the streaming reader.

pub mod detector;
pub mod grouper;
pub mod labels;
pub mod llm;
pub mod normalizer;
pub mod rules;
pub mod streaming;

use serde::{Deserialize, Serialize};

/// Detection thresholds and suspicion lists consumed by the rule engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Time-window size in minutes used to bucket records per source
    pub window_minutes: u32,
    /// Requests per window-minute at which the high-frequency rule fires
    pub high_freq_threshold: f64,
    /// Requests per window-minute at which the medium-frequency rule fires
    pub medium_freq_threshold: f64,
    /// Substrings that mark a user agent as suspicious (case-insensitive)
    pub suspicious_user_agents: Vec<String>,
    /// Regex patterns for private/loopback/broadcast source addresses
    pub suspicious_source_patterns: Vec<String>,
    /// Response codes considered suspicious when tallied in a window
    pub suspicious_response_codes: Vec<String>,
    /// HTTP methods considered suspicious when tallied in a window
    pub suspicious_methods: Vec<String>,
    /// Ground-truth labels that mark a window as a known attack
    pub known_attack_labels: Vec<String>,
    /// Label substring identifying the highest-severity attack family
    pub attack_family_marker: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_minutes: 5,
            high_freq_threshold: 100.0,
            medium_freq_threshold: 50.0,
            suspicious_user_agents: vec![
                "bot".to_string(),
                "curl".to_string(),
                "wget".to_string(),
                "scrapy".to_string(),
                "python-requests".to_string(),
                "crawler".to_string(),
                "spider".to_string(),
            ],
            suspicious_source_patterns: vec![
                r"^10\.".to_string(),
                r"^192\.168\.".to_string(),
                r"^172\.(1[6-9]|2\d|3[01])\.".to_string(),
                r"^127\.".to_string(),
                r"^169\.254\.".to_string(),
                r"^0\.".to_string(),
                r"^255\.255\.255\.255$".to_string(),
            ],
            suspicious_response_codes: vec![
                "429".to_string(),
                "502".to_string(),
                "503".to_string(),
                "504".to_string(),
            ],
            suspicious_methods: vec![
                "HEAD".to_string(),
                "OPTIONS".to_string(),
                "TRACE".to_string(),
                "CONNECT".to_string(),
            ],
            known_attack_labels: vec![
                "ddos".to_string(),
                "dos".to_string(),
                "drdos_dns".to_string(),
                "drdos_ldap".to_string(),
                "drdos_mssql".to_string(),
                "drdos_netbios".to_string(),
                "drdos_ntp".to_string(),
                "drdos_snmp".to_string(),
                "drdos_ssdp".to_string(),
                "drdos_udp".to_string(),
                "syn_flood".to_string(),
                "udp_flood".to_string(),
                "webddos".to_string(),
            ],
            attack_family_marker: "drdos".to_string(),
        }
    }
}

pub use detector::{AnalysisResult, AnalysisStats, DdosDetector, FlaggedWindow};
pub use grouper::{WindowAggregate, WindowGrouper, WindowKey};
pub use llm::LlmClient;
pub use normalizer::{LogRecord, RecordNormalizer, RowRejection};
pub use rules::{Indicator, RuleContext, RuleDef};
pub use streaming::{read_flow_file, IngestError, StreamingReader};
