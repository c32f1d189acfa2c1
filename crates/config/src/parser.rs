use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());
    parse_config(&content)
}

/// Parse configuration text after substituting environment variables.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let config: AppConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!(service = %config.service.name, "Configuration loaded successfully");
    Ok(config)
}

/// Load the file if it exists, otherwise fall back to [`generate_default_config`].
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        warn!(?path, "Config file not found, using built-in defaults");
        Ok(generate_default_config())
    }
}

#[instrument]
pub fn generate_default_config() -> AppConfig {
    AppConfig {
        service: ServiceConfig {
            name: "tradedesk".to_string(),
            log_format: default_log_format(),
        },
        upstream: UpstreamConfig::default(),
        cache: CacheSettings::default(),
        circuit_breaker: CircuitBreakerSettings::default(),
        pricing: PricingSettings::default(),
        fallback: FallbackSettings::default(),
        metrics: MetricsSettings::default(),
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &AppConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tradedesk-{}-{}.yaml", name, std::process::id()))
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("save-load");
        let mut config = generate_default_config();
        config.cache.options_ttl_seconds = 900;

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.service.name, "tradedesk");
        assert_eq!(loaded.cache.options_ttl_seconds, 900);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = scratch_path("does-not-exist");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = scratch_path("fallback-default");
        let config = load_config_or_default(&path).unwrap();
        assert_eq!(config.service.name, "tradedesk");
    }

    #[test]
    fn test_parse_substitutes_env_vars() {
        std::env::set_var("TRADEDESK_TEST_UPSTREAM", "https://example.test");
        let yaml = "service:\n  name: desk\nupstream:\n  base_url: ${TRADEDESK_TEST_UPSTREAM}\n";
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.upstream.base_url, "https://example.test");
    }

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&generate_default_config());
        assert!(report.is_valid(), "{:?}", report.errors);
    }
}
