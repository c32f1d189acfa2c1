//! Observability infrastructure for TradeDesk
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for the market-data engine
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("tradedesk", LogFormat::Pretty)?;
//!
//! // Optional
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_with_filter, LogFormat};
pub use metrics::{init_metrics, EngineMetrics, UpstreamCallGuard};
