//! Option enrichment: greeks, premium per day, liquidity and ranking scores.

use crate::black_scholes::{black_scholes_greeks, DAYS_PER_YEAR, DEFAULT_RISK_FREE_RATE};
use crate::types::{BSInputs, NormalizedOption, RawOptionContract, RiskTier};
use chrono::{DateTime, Utc};

pub const MS_PER_DAY: f64 = 86_400_000.0;

/// IV above this is treated as this for scoring
const IV_SCORE_CAP: f64 = 2.0;
/// Open interest plus volume at which liquidity stops adding to scores
const LIQUIDITY_SCORE_CAP: f64 = 1000.0;

/// Days until `expiry_unix` (seconds), never below one day.
pub fn days_to_expiry(expiry_unix: i64, now: DateTime<Utc>) -> f64 {
    let remaining_ms = expiry_unix
        .saturating_mul(1000)
        .saturating_sub(now.timestamp_millis())
        .max(0) as f64;

    (remaining_ms / MS_PER_DAY).max(1.0)
}

fn liquidity_factor(liquidity: u64) -> f64 {
    (liquidity as f64 / LIQUIDITY_SCORE_CAP).min(1.0)
}

/// 0..=100; higher means safer
pub fn risk_score(delta_abs: f64, implied_volatility: f64, liquidity: u64) -> u8 {
    let raw = delta_abs * 50.0
        + (1.0 - implied_volatility.min(IV_SCORE_CAP)) * 30.0
        + liquidity_factor(liquidity) * 20.0;

    raw.round().clamp(0.0, 100.0) as u8
}

/// Unbounded ranking score, only meaningful relative to other contracts
pub fn composite_score(
    premium_per_day: f64,
    implied_volatility: f64,
    liquidity: u64,
    delta_abs: f64,
) -> i64 {
    let raw = premium_per_day * 30.0
        + implied_volatility.min(IV_SCORE_CAP) * 20.0
        + liquidity_factor(liquidity) * 30.0
        + (100.0 - delta_abs * 100.0) * 0.2;

    raw.round() as i64
}

#[derive(Debug, Clone, Copy)]
pub struct OptionNormalizer {
    risk_free_rate: f64,
}

impl OptionNormalizer {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn normalize(
        &self,
        contract: RawOptionContract,
        underlying_price: f64,
        expiry_unix: i64,
        now: DateTime<Utc>,
    ) -> NormalizedOption {
        let dte = days_to_expiry(expiry_unix, now);
        let iv = contract.implied_volatility;

        let greeks = black_scholes_greeks(BSInputs {
            spot: underlying_price,
            strike: contract.strike,
            time: dte / DAYS_PER_YEAR,
            vol: iv,
            rate: self.risk_free_rate,
            option_type: contract.option_type,
        });

        let mid = (contract.bid + contract.ask) / 2.0;
        let premium_per_day = if dte > 0.0 { mid / dte } else { 0.0 };
        let liquidity = contract.open_interest.saturating_add(contract.volume);
        let delta_abs = greeks.map(|g| g.delta.abs()).unwrap_or(0.0);

        let risk_score = risk_score(delta_abs, iv, liquidity);
        let composite_score = composite_score(premium_per_day, iv, liquidity, delta_abs);

        NormalizedOption {
            contract,
            delta: greeks.map(|g| g.delta),
            gamma: greeks.map(|g| g.gamma),
            theta: greeks.map(|g| g.theta),
            vega: greeks.map(|g| g.vega),
            rho: greeks.map(|g| g.rho),
            probability_itm: greeks.map(|g| g.probability_itm),
            days_to_expiry: dte,
            premium_per_day,
            liquidity,
            risk_score,
            risk_tier: RiskTier::from_score(risk_score),
            composite_score,
        }
    }

    /// Normalize a whole side of a chain and order it by ascending strike
    pub fn normalize_side(
        &self,
        contracts: Vec<RawOptionContract>,
        underlying_price: f64,
        expiry_unix: i64,
        now: DateTime<Utc>,
    ) -> Vec<NormalizedOption> {
        let mut side: Vec<NormalizedOption> = contracts
            .into_iter()
            .map(|c| self.normalize(c, underlying_price, expiry_unix, now))
            .collect();

        side.sort_by(|a, b| a.strike().total_cmp(&b.strike()));
        side
    }
}

impl Default for OptionNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_FREE_RATE)
    }
}
