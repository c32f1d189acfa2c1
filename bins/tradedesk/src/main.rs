//! TradeDesk CLI Binary
//!
//! Entry point for fetching fundamentals and option chains from the command
//! line, and for creating and validating configuration files.

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use config::{
    generate_default_config, load_config, load_config_or_default, save_config, validate_config,
    AppConfig, ValidationReport,
};
use market_data::provider::YahooConfig;
use market_data::{MarketDataProvider, MarketDataRetriever, RetrieverConfig, YahooProvider};
use observability::{init_logging, init_metrics, EngineMetrics, LogFormat};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Logging settings come from the config file unless overridden on the command line
    let config = load_config_or_default(&cli.config)?;
    let format_name = cli
        .log_format
        .as_deref()
        .unwrap_or(config.service.log_format.as_str());
    let format = LogFormat::parse(format_name)
        .with_context(|| format!("Unknown log format: {}", format_name))?;
    init_logging(&config.service.name, format)?;

    debug!(?cli, "CLI arguments parsed");
    info!(command = cli.command.as_str(), "TradeDesk starting");

    match cli.command {
        Commands::Fundamentals { ticker } => {
            let retriever = build_retriever(&config)?;
            let snapshot = retriever.get_fundamentals(&ticker).await?;
            debug!(gate = ?retriever.gate_status(), "Upstream gate after fetch");
            print_json(&snapshot)
        }
        Commands::Options { ticker, expiration } => {
            let retriever = build_retriever(&config)?;
            let chain = retriever.get_options_chain(&ticker, expiration).await?;
            debug!(gate = ?retriever.gate_status(), "Upstream gate after fetch");
            print_json(&chain)
        }
        Commands::Validate => validate_command(&cli.config),
        Commands::Init { output } => init_command(&output),
    }
}

fn log_report(report: &ValidationReport) -> Result<()> {
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot fetch market data due to configuration errors");
    }
    Ok(())
}

fn build_provider(config: &AppConfig) -> Result<Arc<dyn MarketDataProvider>> {
    match config.upstream.provider.as_str() {
        "yahoo" => {
            let provider = YahooProvider::new(YahooConfig::from(&config.upstream))
                .context("Failed to build Yahoo provider")?;
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("Unsupported upstream provider: {}", other),
    }
}

fn build_retriever(config: &AppConfig) -> Result<MarketDataRetriever> {
    log_report(&validate_config(config))?;

    if config.metrics.enabled {
        init_metrics(config.metrics.port).context("Failed to start metrics exporter")?;
    }

    let provider = build_provider(config)?;
    let retriever = MarketDataRetriever::new(provider, RetrieverConfig::from(config))
        .with_metrics(EngineMetrics::default());

    let sweepers = retriever.spawn_sweepers();
    debug!(count = sweepers.len(), "Cache sweepers started");

    Ok(retriever)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {}", config.service.name);
    println!("Provider: {} ({})", config.upstream.provider, config.upstream.base_url);
    println!(
        "Cache TTLs: fundamentals {}s, options {}s",
        config.cache.fundamentals_ttl_seconds, config.cache.options_ttl_seconds
    );
    println!(
        "Circuit breaker: {} failures, {}s cooldown",
        config.circuit_breaker.failure_threshold, config.circuit_breaker.cooldown_seconds
    );
    println!("Fallback policy: {:?}", config.fallback.policy);

    Ok(())
}

fn init_command(output_path: &Path) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!(
        "  2. Run 'tradedesk validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'tradedesk options AAPL --config {:?}' to fetch a chain",
        output_path
    );

    Ok(())
}
