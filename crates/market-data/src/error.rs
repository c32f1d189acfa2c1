//! Market data error types

use thiserror::Error;

/// Errors that can occur during market data operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Transport-level failure reaching the upstream
    #[error("Connection error: {0}")]
    Connection(String),

    /// Upstream answered with an error status or error payload
    #[error("Provider error: {0}")]
    Provider(String),

    /// Upstream did not answer within the configured bound
    #[error("Upstream timed out after {0} ms")]
    Timeout(u64),

    /// Upstream answered but the payload was empty or unusable
    #[error("Malformed upstream response: {0}")]
    Malformed(String),

    /// Invalid symbol
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available
    #[error("Data not available: {0}")]
    DataNotAvailable(String),
}

impl MarketDataError {
    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Provider(_) => "provider",
            Self::Timeout(_) => "timeout",
            Self::Malformed(_) => "malformed",
            Self::InvalidSymbol(_) => "invalid_symbol",
            Self::DataNotAvailable(_) => "unavailable",
        }
    }
}
