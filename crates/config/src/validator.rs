use crate::*;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Unsupported upstream provider: {0}")]
    UnsupportedProvider(String),

    #[error("Upstream base_url '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("Upstream session_url '{0}' must be an http(s) URL")]
    InvalidSessionUrl(String),

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("risk_free_rate must be between {min} and {max}, got {value}")]
    RiskFreeRateOutOfRange { value: f64, min: f64, max: f64 },

    #[error("metrics.port must be non-zero when metrics are enabled")]
    InvalidMetricsPort,

    #[error("Environment variable placeholder in '{field}' was not resolved")]
    UnresolvedEnvVar { field: String },
}

pub const MIN_RISK_FREE_RATE: f64 = -0.05;
pub const MAX_RISK_FREE_RATE: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &AppConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_service(&config.service, &mut report);
    validate_upstream(&config.upstream, &mut report);
    validate_cache(&config.cache, &mut report);
    validate_circuit_breaker(&config.circuit_breaker, &mut report);
    validate_pricing(&config.pricing, &mut report);
    validate_metrics(&config.metrics, &mut report);

    if config.fallback.policy == FallbackPolicySetting::Strict {
        report.add_warning(
            "fallback.policy",
            "strict mode surfaces upstream failures to callers instead of serving synthetic data",
        );
    }

    report
}

fn validate_service(service: &ServiceConfig, report: &mut ValidationReport) {
    if service.name.trim().is_empty() {
        report.add_error(ValidationError::MissingServiceName);
    }

    let format = service.log_format.to_lowercase();
    if !SUPPORTED_LOG_FORMATS.contains(&format.as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(service.log_format.clone()));
    }
}

fn validate_upstream(upstream: &UpstreamConfig, report: &mut ValidationReport) {
    if !SUPPORTED_PROVIDERS.contains(&upstream.provider.as_str()) {
        report.add_error(ValidationError::UnsupportedProvider(upstream.provider.clone()));
    }

    if has_unresolved_env_vars(&upstream.base_url) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: "upstream.base_url".to_string(),
        });
    } else {
        match Url::parse(&upstream.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                if url.scheme() == "http" {
                    report.add_warning("upstream.base_url", "upstream is reached over plain http");
                }
            }
            Ok(url) => report.add_error(ValidationError::InvalidBaseUrl {
                url: upstream.base_url.clone(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => report.add_error(ValidationError::InvalidBaseUrl {
                url: upstream.base_url.clone(),
                message: e.to_string(),
            }),
        }
    }

    let session_ok = Url::parse(&upstream.session_url)
        .map(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or(false);
    if !session_ok {
        report.add_error(ValidationError::InvalidSessionUrl(upstream.session_url.clone()));
    }

    if upstream.timeout_ms == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "upstream.timeout_ms".to_string(),
        });
    }
}

fn validate_cache(cache: &CacheSettings, report: &mut ValidationReport) {
    if cache.fundamentals_ttl_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "cache.fundamentals_ttl_seconds".to_string(),
        });
    }

    if cache.options_ttl_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "cache.options_ttl_seconds".to_string(),
        });
    }

    if cache.options_ttl_seconds < cache.fundamentals_ttl_seconds {
        report.add_warning(
            "cache.options_ttl_seconds",
            "option chains expire sooner than fundamentals; upstream load will be higher",
        );
    }

    if cache.sweep_interval_seconds == 0 {
        report.add_warning(
            "cache.sweep_interval_seconds",
            "background sweep disabled; expired entries are only dropped when overwritten",
        );
    }
}

fn validate_circuit_breaker(breaker: &CircuitBreakerSettings, report: &mut ValidationReport) {
    if breaker.failure_threshold == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "circuit_breaker.failure_threshold".to_string(),
        });
    }

    if breaker.cooldown_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "circuit_breaker.cooldown_seconds".to_string(),
        });
    }
}

fn validate_pricing(pricing: &PricingSettings, report: &mut ValidationReport) {
    let rate = pricing.risk_free_rate;
    if !rate.is_finite() || !(MIN_RISK_FREE_RATE..=MAX_RISK_FREE_RATE).contains(&rate) {
        report.add_error(ValidationError::RiskFreeRateOutOfRange {
            value: rate,
            min: MIN_RISK_FREE_RATE,
            max: MAX_RISK_FREE_RATE,
        });
    }
}

fn validate_metrics(metrics: &MetricsSettings, report: &mut ValidationReport) {
    if metrics.enabled && metrics.port == 0 {
        report.add_error(ValidationError::InvalidMetricsPort);
    }
}
