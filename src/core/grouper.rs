//! Time-window grouping for the DDoS flow analyzer.
//!
//! This module buckets normalized records by (source address, window index)
//! and accumulates the per-window aggregates the rule engine scores.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::normalizer::{LogRecord, UNKNOWN};
use crate::core::DetectionConfig;

/// Key identifying one fixed-length time window for one source address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WindowKey {
    /// Source address
    pub source: String,
    /// `floor(timestamp_secs / (window_minutes * 60))`
    pub window_index: i64,
}

impl WindowKey {
    /// Compute the window key for a record.
    ///
    /// The index depends only on the record timestamp and the configured
    /// window size, so identical inputs always map to identical keys.
    pub fn for_record(record: &LogRecord, window_minutes: u32) -> Self {
        let window_secs = i64::from(window_minutes) * 60;
        Self {
            source: record.source.clone(),
            window_index: record.timestamp.div_euclid(window_secs),
        }
    }
}

/// Accumulated view of one window, read-only once handed to scoring
#[derive(Debug, Clone, Serialize)]
pub struct WindowAggregate {
    /// Source address
    pub source: String,
    /// Window index
    pub window_index: i64,
    /// Contributing records in encounter order
    pub records: Vec<LogRecord>,
    /// Running total of record request counts
    pub total_requests: u64,
    /// Distinct request paths
    pub paths: BTreeSet<String>,
    /// Distinct user agents
    pub user_agents: BTreeSet<String>,
    /// Response code -> cumulative request count
    pub response_codes: BTreeMap<String, u64>,
    /// HTTP method -> cumulative request count
    pub methods: BTreeMap<String, u64>,
    /// Distinct labels seen in the window
    pub labels: BTreeSet<String>,
    /// Whether any label matched a configured known-DDoS label
    pub known_attack: bool,
}

impl WindowAggregate {
    fn new(key: &WindowKey) -> Self {
        Self {
            source: key.source.clone(),
            window_index: key.window_index,
            records: Vec::new(),
            total_requests: 0,
            paths: BTreeSet::new(),
            user_agents: BTreeSet::new(),
            response_codes: BTreeMap::new(),
            methods: BTreeMap::new(),
            labels: BTreeSet::new(),
            known_attack: false,
        }
    }
}

/// Accumulator mapping window keys to aggregates.
///
/// `ingest` may be called once with a whole collection or repeatedly with
/// successive batches; both paths accumulate into the same map, so the
/// streamed and whole-file pipelines share this code. Aside from the
/// encounter-ordered record list, the final aggregate contents do not
/// depend on batch boundaries or ingestion order.
pub struct WindowGrouper {
    window_minutes: u32,
    /// Lowercased known-attack labels for case-insensitive exact matching
    known_attack_labels: BTreeSet<String>,
    windows: BTreeMap<WindowKey, WindowAggregate>,
}

impl WindowGrouper {
    /// Create a grouper for one analysis run
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            window_minutes: config.window_minutes,
            known_attack_labels: config
                .known_attack_labels
                .iter()
                .map(|l| l.trim().to_lowercase())
                .collect(),
            windows: BTreeMap::new(),
        }
    }

    /// Fold a batch of records into the aggregate map
    pub fn ingest(&mut self, batch: &[LogRecord]) {
        for record in batch {
            self.insert(record);
        }
    }

    fn insert(&mut self, record: &LogRecord) {
        let key = WindowKey::for_record(record, self.window_minutes);
        let window = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| WindowAggregate::new(&key));

        window.total_requests += record.request_count;
        window.paths.insert(record.path.clone());
        window.user_agents.insert(record.user_agent.clone());

        if record.label != UNKNOWN {
            if self
                .known_attack_labels
                .contains(&record.label.trim().to_lowercase())
            {
                window.known_attack = true;
            }
            window.labels.insert(record.label.clone());
        }
        if record.response_code != UNKNOWN {
            *window
                .response_codes
                .entry(record.response_code.clone())
                .or_insert(0) += record.request_count;
        }
        if record.method != UNKNOWN {
            *window.methods.entry(record.method.clone()).or_insert(0) +=
                record.request_count;
        }

        window.records.push(record.clone());
    }

    /// Number of windows accumulated so far
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no records have been ingested yet
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Hand the accumulated windows to the scoring pass.
    ///
    /// The backing map is ordered by (source, window index), which keeps
    /// downstream iteration deterministic across runs.
    pub fn finalize(self) -> BTreeMap<WindowKey, WindowAggregate> {
        self.windows
    }
}
