use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tradedesk")]
#[command(about = "TradeDesk - Market data retrieval and options analytics")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "tradedesk.yaml", env = "TRADEDESK_CONFIG")]
    pub config: PathBuf,

    /// Log format override (pretty, json, compact)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch equity fundamentals for a ticker
    Fundamentals {
        /// Ticker symbol, case-insensitive
        ticker: String,
    },

    /// Fetch a normalized option chain for a ticker
    Options {
        /// Ticker symbol, case-insensitive
        ticker: String,

        /// Expiry as unix seconds; the nearest listed expiry when omitted
        #[arg(short, long)]
        expiration: Option<i64>,
    },

    /// Validate configuration without fetching anything
    Validate,

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "tradedesk.yaml")]
        output: PathBuf,
    },
}

impl Commands {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commands::Fundamentals { .. } => "fundamentals",
            Commands::Options { .. } => "options",
            Commands::Validate => "validate",
            Commands::Init { .. } => "init",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
