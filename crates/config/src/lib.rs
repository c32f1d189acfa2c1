//! Configuration for the TradeDesk market-data engine.
//!
//! The file format is YAML. Every section except `service` is optional and
//! falls back to the values in [`defaults`], so a minimal file only names the
//! service.

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    pub pricing: PricingSettings,
    #[serde(default)]
    pub fallback: FallbackSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    /// One of `pretty`, `json`, `compact`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Upstream market-data provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Visited once to obtain a session cookie before the crumb request
    #[serde(default = "default_session_url")]
    pub session_url: String,
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            session_url: default_session_url(),
            timeout_ms: default_upstream_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default = "default_fundamentals_ttl_seconds")]
    pub fundamentals_ttl_seconds: u64,
    #[serde(default = "default_options_ttl_seconds")]
    pub options_ttl_seconds: u64,
    /// Period of the background sweep that drops expired entries. 0 disables it.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fundamentals_ttl_seconds: default_fundamentals_ttl_seconds(),
            options_ttl_seconds: default_options_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingSettings {
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicySetting {
    /// Substitute synthetic data whenever the upstream cannot answer
    #[default]
    Resilient,
    /// Surface upstream failures to the caller
    Strict,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FallbackSettings {
    #[serde(default)]
    pub policy: FallbackPolicySetting,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}
