pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_provider() -> String {
    "yahoo".to_string()
}

pub fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

/// Host that hands out the session cookie a crumb is bound to
pub fn default_session_url() -> String {
    "https://fc.yahoo.com".to_string()
}

pub fn default_upstream_timeout_ms() -> u64 {
    8_000
}

pub fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; tradedesk/0.1)".to_string()
}

pub fn default_fundamentals_ttl_seconds() -> u64 {
    120
}

pub fn default_options_ttl_seconds() -> u64 {
    300
}

pub fn default_sweep_interval_seconds() -> u64 {
    60
}

pub fn default_failure_threshold() -> u32 {
    5
}

pub fn default_cooldown_seconds() -> u64 {
    30 * 60
}

pub fn default_risk_free_rate() -> f64 {
    0.045
}

pub fn default_metrics_port() -> u16 {
    9090
}

pub const SUPPORTED_PROVIDERS: &[&str] = &["yahoo"];

pub const SUPPORTED_LOG_FORMATS: &[&str] = &["pretty", "json", "compact"];
