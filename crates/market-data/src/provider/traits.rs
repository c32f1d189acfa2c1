//! Upstream provider seam

use crate::Result;
use async_trait::async_trait;

/// Quote and fundamentals fields for one symbol, as the upstream reported them.
///
/// Absent fields stay `None`; the retriever decides what a missing value means.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteRecord {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub quote_type: Option<String>,
    pub price: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<f64>,
    pub previous_close: Option<f64>,
    pub day_change: Option<f64>,
    pub day_change_percent: Option<f64>,
    pub eps: Option<f64>,
    pub beta: Option<f64>,
    pub dividend_rate: Option<f64>,
    pub trailing_dividend_rate: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub trailing_dividend_yield: Option<f64>,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    pub fifty_day_avg: Option<f64>,
    pub two_hundred_day_avg: Option<f64>,
    pub avg_volume: Option<f64>,
}

/// One listed contract
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractRecord {
    pub contract_symbol: Option<String>,
    pub strike: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub implied_volatility: Option<f64>,
    pub open_interest: Option<f64>,
    pub volume: Option<f64>,
    pub in_the_money: Option<bool>,
}

/// Listed expiries plus the contracts of one of them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionChainRecord {
    pub underlying_price: Option<f64>,
    /// Unix seconds, in whatever order the upstream sent them
    pub expirations: Vec<i64>,
    /// Expiry the `calls` and `puts` belong to, when the upstream says
    pub contracts_expiration: Option<i64>,
    pub calls: Vec<ContractRecord>,
    pub puts: Vec<ContractRecord>,
}

impl OptionChainRecord {
    pub fn has_contracts(&self) -> bool {
        !self.calls.is_empty() || !self.puts.is_empty()
    }
}

/// Source of live market data - protocol agnostic
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn quote(&self, symbol: &str) -> Result<QuoteRecord>;

    /// Listed expiries for `symbol` and the contracts for `expiration`, or for
    /// the provider's default expiry when `None`.
    async fn option_chain(&self, symbol: &str, expiration: Option<i64>)
        -> Result<OptionChainRecord>;
}
