//! Shared types for Market Data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Option type (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }

    /// Single-letter code used in contract symbols
    pub fn code(&self) -> char {
        match self {
            OptionType::Call => 'C',
            OptionType::Put => 'P',
        }
    }
}

/// Inputs for Black-Scholes pricing
#[derive(Debug, Clone, Copy)]
pub struct BSInputs {
    /// Spot price of the underlying
    pub spot: f64,
    /// Strike price
    pub strike: f64,
    /// Time to expiry (in years)
    pub time: f64,
    /// Implied volatility (as decimal, e.g., 0.5 = 50%)
    pub vol: f64,
    /// Annualised risk-free rate
    pub rate: f64,
    /// Option type
    pub option_type: OptionType,
}

impl BSInputs {
    /// True when the closed form would divide by zero or take the log of a
    /// non-positive ratio. Such inputs price to no greeks at all.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.spot, self.strike, self.time, self.vol, self.rate]
            .iter()
            .all(|v| v.is_finite());

        !finite || self.spot <= 0.0 || self.strike <= 0.0 || self.vol <= 0.0 || self.time <= 0.0
    }
}

/// Option Greeks plus the risk-neutral probability of finishing in the money
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Delta: ∂V/∂S (rate of change with spot)
    pub delta: f64,
    /// Gamma: ∂²V/∂S² (curvature of delta)
    pub gamma: f64,
    /// Theta per calendar day
    pub theta: f64,
    /// Vega per one volatility point
    pub vega: f64,
    /// Rho per one percentage point of rate
    pub rho: f64,
    /// N(d2) for calls, N(-d2) for puts
    pub probability_itm: f64,
}

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Real,
    Synthetic,
}

/// Coarse risk bucket derived from the risk score. A higher score means a
/// lower risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_score(score: u8) -> Self {
        if score >= 70 {
            RiskTier::Low
        } else if score >= 40 {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }
}

/// A single option quote as delivered by a provider (or the generator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOptionContract {
    pub contract_symbol: String,
    pub strike: f64,
    pub bid: f64,
    pub ask: f64,
    pub implied_volatility: f64,
    pub open_interest: u64,
    pub volume: u64,
    pub in_the_money: bool,
    pub option_type: OptionType,
}

/// A contract enriched with greeks and ranking fields
///
/// Every derived field depends only on this contract, the underlying price
/// and the expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOption {
    #[serde(flatten)]
    pub contract: RawOptionContract,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
    pub rho: Option<f64>,
    pub probability_itm: Option<f64>,
    pub days_to_expiry: f64,
    pub premium_per_day: f64,
    pub liquidity: u64,
    pub risk_score: u8,
    pub risk_tier: RiskTier,
    pub composite_score: i64,
}

impl NormalizedOption {
    pub fn strike(&self) -> f64 {
        self.contract.strike
    }

    pub fn contract_symbol(&self) -> &str {
        &self.contract.contract_symbol
    }
}

/// Shortlists of trade ideas drawn from a normalized chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighlightedTrades {
    /// OTM puts ranked by premium per day
    pub otm_puts_high_premium: Vec<NormalizedOption>,
    /// OTM calls ranked by implied volatility, then composite score
    pub otm_calls_iv_crush: Vec<NormalizedOption>,
}

/// Equity fundamentals. Numeric fields are 0 when the source did not supply them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub ticker: String,
    pub display_name: String,
    pub quote_type: String,
    pub price: f64,
    pub open: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub volume: f64,
    pub previous_close: f64,
    pub day_change: f64,
    pub day_change_percent: f64,
    pub eps: f64,
    pub beta: f64,
    pub dividend_rate: f64,
    /// Percent, e.g. 0.39 means 0.39%
    pub dividend_yield: f64,
    pub revenue: f64,
    pub net_income: f64,
    pub market_cap: f64,
    pub trailing_pe: f64,
    pub forward_pe: f64,
    pub week52_high: f64,
    pub week52_low: f64,
    pub fifty_day_avg: f64,
    pub two_hundred_day_avg: f64,
    pub avg_volume: f64,
    pub provenance: Provenance,
    /// True only when served from the cache
    pub cached: bool,
    pub captured_at: DateTime<Utc>,
}

impl FundamentalsSnapshot {
    /// A snapshot with every numeric field zeroed
    pub fn new(ticker: &str, provenance: Provenance, captured_at: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.to_string(),
            display_name: ticker.to_string(),
            quote_type: "EQUITY".to_string(),
            price: 0.0,
            open: 0.0,
            day_high: 0.0,
            day_low: 0.0,
            volume: 0.0,
            previous_close: 0.0,
            day_change: 0.0,
            day_change_percent: 0.0,
            eps: 0.0,
            beta: 0.0,
            dividend_rate: 0.0,
            dividend_yield: 0.0,
            revenue: 0.0,
            net_income: 0.0,
            market_cap: 0.0,
            trailing_pe: 0.0,
            forward_pe: 0.0,
            week52_high: 0.0,
            week52_low: 0.0,
            fifty_day_avg: 0.0,
            two_hundred_day_avg: 0.0,
            avg_volume: 0.0,
            provenance,
            cached: false,
            captured_at,
        }
    }
}

/// A normalized option chain for one expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainResult {
    pub ticker: String,
    pub underlying_price: f64,
    /// Unix seconds, ascending
    pub expirations: Vec<i64>,
    /// Unix seconds
    pub selected_expiration: i64,
    /// Ascending by strike
    pub calls: Vec<NormalizedOption>,
    /// Ascending by strike
    pub puts: Vec<NormalizedOption>,
    pub highlighted_trades: HighlightedTrades,
    pub provenance: Provenance,
    pub cached: bool,
    pub captured_at: DateTime<Utc>,
}
