use serde::{Deserialize, Serialize};

use crate::core::DetectionConfig;

/// Column-name mapping for the input format.
///
/// Required columns identify the fields every record must carry; the
/// optional ones default to the "unknown" sentinel when the source format
/// does not supply them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    /// Timestamp column
    pub timestamp: String,
    /// Source address column
    pub source: String,
    /// Destination address column
    pub destination: String,
    /// Forward-packet / request count column
    pub request_count: String,
    /// Flow duration column
    pub flow_duration: String,
    /// Total byte length column
    pub byte_count: String,
    /// Ground-truth label column
    pub label: String,
    /// User agent column, if the format has one
    pub user_agent: Option<String>,
    /// Response code column, if the format has one
    pub response_code: Option<String>,
    /// HTTP method column, if the format has one
    pub method: Option<String>,
    /// Request path column, if the format has one
    pub path: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            source: "src_ip".to_string(),
            destination: "dst_ip".to_string(),
            request_count: "fwd_packets".to_string(),
            flow_duration: "flow_duration".to_string(),
            byte_count: "total_length".to_string(),
            label: "label".to_string(),
            user_agent: Some("user_agent".to_string()),
            response_code: Some("response_code".to_string()),
            method: Some("method".to_string()),
            path: Some("path".to_string()),
        }
    }
}

/// Streaming ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Records per emitted batch
    pub batch_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// LLM explanation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat completions endpoint
    pub api_url: String,
    /// API key; falls back to the OPENAI_API_KEY environment variable
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Maximum request attempts per flagged window
    pub max_attempts: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Initial backoff between attempts in milliseconds; doubles per retry
    pub backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_attempts: 3,
            timeout_secs: 30,
            backoff_ms: 500,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input column-name mapping
    pub columns: ColumnMap,
    /// Detection thresholds and suspicion lists
    pub detection: DetectionConfig,
    /// Streaming ingestion settings
    pub stream: StreamConfig,
    /// LLM explanation settings
    pub llm: LlmConfig,
}
