//! Prometheus metrics infrastructure
//!
//! The engine records through the `metrics` facade. Until [`init_metrics`]
//! installs the Prometheus recorder every call is a no-op, which keeps unit
//! tests free of global state.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

pub const CACHE_HITS: &str = "market_data_cache_hits_total";
pub const CACHE_MISSES: &str = "market_data_cache_misses_total";
pub const UPSTREAM_FAILURES: &str = "market_data_upstream_failures_total";
pub const FALLBACKS: &str = "market_data_fallbacks_total";
pub const UPSTREAM_LATENCY: &str = "market_data_upstream_latency_seconds";
pub const GATE_OPEN: &str = "market_data_gate_open";

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener on `port` that serves `/metrics`.
///
/// ```ignore
/// observability::metrics::init_metrics(9090)?;
/// ```
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Metrics for the market-data retrieval engine
///
/// `dataset` labels are `fundamentals` or `options`.
///
/// # Metrics
///
/// * `market_data_cache_hits_total` / `market_data_cache_misses_total`
/// * `market_data_upstream_failures_total`
/// * `market_data_fallbacks_total` (labelled with the fallback reason)
/// * `market_data_upstream_latency_seconds`
/// * `market_data_gate_open` (1 while upstream calls are suspended)
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    component: String,
}

impl EngineMetrics {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
        }
    }

    pub fn cache_hit(&self, dataset: &'static str) {
        counter!(CACHE_HITS, "component" => self.component.clone(), "dataset" => dataset)
            .increment(1);
    }

    pub fn cache_miss(&self, dataset: &'static str) {
        counter!(CACHE_MISSES, "component" => self.component.clone(), "dataset" => dataset)
            .increment(1);
    }

    pub fn upstream_failure(&self, dataset: &'static str) {
        counter!(UPSTREAM_FAILURES, "component" => self.component.clone(), "dataset" => dataset)
            .increment(1);
    }

    pub fn fallback(&self, dataset: &'static str, reason: &'static str) {
        counter!(
            FALLBACKS,
            "component" => self.component.clone(),
            "dataset" => dataset,
            "reason" => reason
        )
        .increment(1);
    }

    pub fn set_gate_open(&self, open: bool) {
        gauge!(GATE_OPEN, "component" => self.component.clone())
            .set(if open { 1.0 } else { 0.0 });
    }

    /// Start timing an upstream call; the latency is recorded when the guard drops
    pub fn upstream_timer(&self, dataset: &'static str) -> UpstreamCallGuard<'_> {
        UpstreamCallGuard {
            metrics: self,
            dataset,
            start: Instant::now(),
            outcome: "failure",
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new("market_data")
    }
}

/// Records upstream latency on drop
///
/// Outcome defaults to `failure` so an early return or a cancelled future is
/// never counted as a success.
pub struct UpstreamCallGuard<'a> {
    metrics: &'a EngineMetrics,
    dataset: &'static str,
    start: Instant,
    outcome: &'static str,
}

impl UpstreamCallGuard<'_> {
    pub fn succeeded(&mut self) {
        self.outcome = "success";
    }
}

impl Drop for UpstreamCallGuard<'_> {
    fn drop(&mut self) {
        histogram!(
            UPSTREAM_LATENCY,
            "component" => self.metrics.component.clone(),
            "dataset" => self.dataset,
            "outcome" => self.outcome
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}
