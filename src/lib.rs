//! Rule-based DDoS detection for network flow logs.
//!
//! The pipeline normalizes raw tabular rows into canonical records,
//! buckets them by source address and fixed time window, evaluates an
//! ordered registry of suspicion rules plus a label-driven overlay against
//! each window, and produces a ranked list of flagged windows with
//! explanatory indicators and run statistics.

pub mod config;
pub mod core;
pub mod models;
pub mod report;
pub mod utils;
