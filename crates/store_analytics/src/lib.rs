//! Post-run analytics for the grocery store simulation: run summaries,
//! per-metric CSV tables, and aggregation across runs.
//!
//! Consumes the [store_core::telemetry::AnalyticsBundle] a session hands
//! back; never touches live engine state.

pub mod export;
pub mod metrics;

pub use export::{export_run, write_combined_summary, ExportError};
pub use metrics::{CheckoutUtilization, RunSummary};
