//! # Cost Tracking Module
//!
//! Per-run cost accounting, cumulative summaries, and budget enforcement.

pub mod cost;

pub use cost::{CostEntry, CostReport, CostSummary, CostTracker};
