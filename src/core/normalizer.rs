//! Record normalization for the DDoS flow analyzer.
//!
//! This module converts raw tabular rows into canonical log records,
//! rejecting rows that lack the fields required for windowing.

use csv::StringRecord;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ColumnMap;
use crate::utils::parse_timestamp;

/// Sentinel value for fields the source format does not supply.
pub const UNKNOWN: &str = "unknown";

/// Reasons a row can be rejected during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("missing or unparsable timestamp")]
    MissingTimestamp,
    #[error("missing source address")]
    MissingSource,
    #[error("missing destination address")]
    MissingDestination,
}

/// A rejected input row, carrying its 1-based row index for diagnostics
#[derive(Debug, Clone, Error)]
#[error("row {row} rejected: {reason}")]
pub struct RowRejection {
    /// 1-based index of the offending data row
    pub row: usize,
    /// Why the row was rejected
    pub reason: RejectReason,
}

/// One normalized flow record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Source address
    pub source: String,
    /// Destination address
    pub destination: String,
    /// Request count carried by this row (forward packets), at least 1
    pub request_count: u64,
    /// Flow duration, non-negative
    pub flow_duration: f64,
    /// Total byte count, non-negative
    pub byte_count: f64,
    /// Ground-truth label, or the sentinel when absent
    pub label: String,
    /// User agent, or the sentinel when absent
    pub user_agent: String,
    /// Response code, or the sentinel when absent
    pub response_code: String,
    /// HTTP method, or the sentinel when absent
    pub method: String,
    /// Request path, or the sentinel when absent
    pub path: String,
}

/// Normalizes raw rows against a resolved header layout.
///
/// Column positions are resolved once from the header row; normalization
/// itself is stateless, so calls are idempotent and order-independent.
#[derive(Debug)]
pub struct RecordNormalizer {
    timestamp: Option<usize>,
    source: Option<usize>,
    destination: Option<usize>,
    request_count: Option<usize>,
    flow_duration: Option<usize>,
    byte_count: Option<usize>,
    label: Option<usize>,
    user_agent: Option<usize>,
    response_code: Option<usize>,
    method: Option<usize>,
    path: Option<usize>,
}

impl RecordNormalizer {
    /// Resolve the configured column names against the header row.
    ///
    /// Header cells are trimmed and compared case-insensitively; flow
    /// exports routinely pad header names with spaces.
    pub fn new(columns: &ColumnMap, headers: &StringRecord) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
        };
        let find_opt = |name: &Option<String>| name.as_deref().and_then(|n| find(n));

        Self {
            timestamp: find(&columns.timestamp),
            source: find(&columns.source),
            destination: find(&columns.destination),
            request_count: find(&columns.request_count),
            flow_duration: find(&columns.flow_duration),
            byte_count: find(&columns.byte_count),
            label: find(&columns.label),
            user_agent: find_opt(&columns.user_agent),
            response_code: find_opt(&columns.response_code),
            method: find_opt(&columns.method),
            path: find_opt(&columns.path),
        }
    }

    /// Normalize one raw row into a [`LogRecord`].
    ///
    /// # Arguments
    ///
    /// * `row` - The raw row to normalize
    /// * `row_index` - 1-based index of the row, used in diagnostics
    ///
    /// # Returns
    ///
    /// * `Ok(LogRecord)` if the row carries a timestamp, source and destination
    /// * `Err(RowRejection)` otherwise; the row is skipped, never fatal
    pub fn normalize(
        &self,
        row: &StringRecord,
        row_index: usize,
    ) -> Result<LogRecord, RowRejection> {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let reject = |reason: RejectReason| {
            warn!("skipping row {}: {}", row_index, reason);
            RowRejection {
                row: row_index,
                reason,
            }
        };

        let timestamp = cell(self.timestamp)
            .and_then(parse_timestamp)
            .ok_or_else(|| reject(RejectReason::MissingTimestamp))?;
        let source = cell(self.source)
            .ok_or_else(|| reject(RejectReason::MissingSource))?
            .to_string();
        let destination = cell(self.destination)
            .ok_or_else(|| reject(RejectReason::MissingDestination))?
            .to_string();

        let request_count = cell(self.request_count)
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.max(1))
            .unwrap_or(1);
        let flow_duration = cell(self.flow_duration)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v.max(0.0))
            .unwrap_or(0.0);
        let byte_count = cell(self.byte_count)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v.max(0.0))
            .unwrap_or(0.0);

        let text = |idx: Option<usize>| {
            cell(idx).map(str::to_string).unwrap_or_else(|| UNKNOWN.to_string())
        };

        Ok(LogRecord {
            timestamp,
            source,
            destination,
            request_count,
            flow_duration,
            byte_count,
            label: text(self.label),
            user_agent: text(self.user_agent),
            response_code: text(self.response_code),
            method: text(self.method),
            path: text(self.path),
        })
    }
}
