//! Deterministic stand-in data used whenever the upstream cannot answer.
//!
//! Everything is derived from a base price seeded by the ticker's character
//! codes, so a symbol always maps to the same fundamentals and the same strike
//! ladder. Option contracts go through the same [`OptionNormalizer`] as live
//! quotes, so the derived fields have identical shape.

use crate::highlights::select_highlights;
use crate::normalizer::OptionNormalizer;
use crate::types::{
    FundamentalsSnapshot, OptionChainResult, OptionType, Provenance, RawOptionContract,
};
use chrono::{DateTime, Utc};

pub const EXPIRY_LADDER_DAYS: [i64; 3] = [14, 28, 56];
pub const STRIKE_OFFSETS: [i32; 7] = [-3, -2, -1, 0, 1, 2, 3];
pub const STRIKE_STEP: f64 = 5.0;

const BASE_PRICE_FLOOR: u64 = 50;
const BASE_PRICE_RANGE: u64 = 450;
const SECONDS_PER_DAY: i64 = 86_400;
const SYNTHETIC_OPEN_INTEREST: u64 = 200;
const SYNTHETIC_VOLUME: u64 = 50;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Base price in [50, 500): 50 plus the position-weighted sum of the
/// symbol's UTF-16 code units, modulo 450.
pub fn seeded_base_price(symbol: &str) -> f64 {
    let seed: u64 = symbol
        .encode_utf16()
        .enumerate()
        .map(|(idx, unit)| u64::from(unit) * (idx as u64 + 1))
        .sum();

    (BASE_PRICE_FLOOR + seed % BASE_PRICE_RANGE) as f64
}

/// Expiries 14, 28 and 56 days after `now`, in unix seconds
pub fn expiry_ladder(now: DateTime<Utc>) -> Vec<i64> {
    let now_secs = now.timestamp();
    EXPIRY_LADDER_DAYS
        .iter()
        .map(|days| now_secs + days * SECONDS_PER_DAY)
        .collect()
}

/// Seven strikes spaced [`STRIKE_STEP`] apart, centred on `base_price`
pub fn strike_ladder(base_price: f64) -> Vec<f64> {
    STRIKE_OFFSETS
        .iter()
        .map(|offset| round2(base_price + f64::from(*offset) * STRIKE_STEP))
        .collect()
}

fn strike_code(strike: f64) -> String {
    if strike.fract() == 0.0 {
        format!("{}", strike as i64)
    } else {
        strike.to_string().replace('.', "")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticGenerator {
    normalizer: OptionNormalizer,
}

impl SyntheticGenerator {
    pub fn new(normalizer: OptionNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn fundamentals(&self, symbol: &str, now: DateTime<Utc>) -> FundamentalsSnapshot {
        let base = seeded_base_price(symbol);
        let market_cap = (base * 1_000_000_000.0).round();
        let price = round2(base);
        let dividend = round2(base * 0.01);

        let mut snapshot = FundamentalsSnapshot::new(symbol, Provenance::Synthetic, now);
        snapshot.price = price;
        snapshot.eps = round2(base / 20.0);
        snapshot.dividend_rate = dividend;
        snapshot.dividend_yield = if price > 0.0 { round2(dividend / price * 100.0) } else { 0.0 };
        snapshot.revenue = market_cap * 0.2;
        snapshot.net_income = market_cap * 0.04;
        snapshot.market_cap = market_cap;
        snapshot.trailing_pe = round2(18.0 + base % 10.0);
        snapshot.week52_high = round2(base * 1.2);
        snapshot.week52_low = round2(base * 0.8);
        snapshot
    }

    fn contract(
        &self,
        symbol: &str,
        expiry: i64,
        strike: f64,
        underlying: f64,
        option_type: OptionType,
    ) -> RawOptionContract {
        let distance = (strike - underlying).abs();
        let moneyness = distance / underlying;
        let bid = round2((2.5 - distance / 5.0).max(0.2));
        let ask = round2(bid + 0.1);

        let in_the_money = match option_type {
            OptionType::Call => strike < underlying,
            OptionType::Put => strike > underlying,
        };

        RawOptionContract {
            contract_symbol: format!(
                "{}{}{}{}",
                symbol,
                expiry,
                option_type.code(),
                strike_code(strike)
            ),
            strike,
            bid,
            ask,
            implied_volatility: 0.2 + moneyness,
            open_interest: SYNTHETIC_OPEN_INTEREST,
            volume: SYNTHETIC_VOLUME,
            in_the_money,
            option_type,
        }
    }

    /// A full chain for `expiration`, or for the nearest ladder expiry when none is given
    pub fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<i64>,
        now: DateTime<Utc>,
    ) -> OptionChainResult {
        let expirations = expiry_ladder(now);
        let selected = expiration.unwrap_or(expirations[0]);
        let underlying = seeded_base_price(symbol);
        let strikes = strike_ladder(underlying);

        let side = |option_type: OptionType| {
            let raw = strikes
                .iter()
                .map(|&strike| self.contract(symbol, selected, strike, underlying, option_type))
                .collect();
            self.normalizer.normalize_side(raw, underlying, selected, now)
        };

        let calls = side(OptionType::Call);
        let puts = side(OptionType::Put);
        let highlighted_trades = select_highlights(&calls, &puts, underlying);

        OptionChainResult {
            ticker: symbol.to_string(),
            underlying_price: underlying,
            expirations,
            selected_expiration: selected,
            calls,
            puts,
            highlighted_trades,
            provenance: Provenance::Synthetic,
            cached: false,
            captured_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_seeded_base_price_known_symbols() {
        // 90 * (1 + 2 + 3 + 4) = 900, 900 % 450 = 0
        assert_eq!(seeded_base_price("ZZZZ"), 50.0);
        // 65 + 130 + 240 + 304 = 739, 739 % 450 = 289
        assert_eq!(seeded_base_price("AAPL"), 339.0);
    }

    #[test]
    fn test_base_price_in_range() {
        for symbol in ["A", "MSFT", "BRK.B", "SPY", "GOOGL", "^VIX"] {
            let price = seeded_base_price(symbol);
            assert!((50.0..500.0).contains(&price), "{} -> {}", symbol, price);
        }
    }

    #[test]
    fn test_deterministic_across_calls() {
        let generator = SyntheticGenerator::default();
        assert_eq!(
            generator.fundamentals("NVDA", now()),
            generator.fundamentals("NVDA", now())
        );
        assert_eq!(
            generator.option_chain("NVDA", None, now()),
            generator.option_chain("NVDA", None, now())
        );
    }

    #[test]
    fn test_fundamentals_derivation() {
        let snapshot = SyntheticGenerator::default().fundamentals("ZZZZ", now());

        assert_eq!(snapshot.provenance, Provenance::Synthetic);
        assert_eq!(snapshot.price, 50.0);
        assert_eq!(snapshot.eps, 2.5);
        assert_eq!(snapshot.dividend_rate, 0.5);
        assert_eq!(snapshot.dividend_yield, 1.0);
        assert_eq!(snapshot.market_cap, 50_000_000_000.0);
        assert_eq!(snapshot.revenue, 10_000_000_000.0);
        assert_eq!(snapshot.net_income, 2_000_000_000.0);
        assert_eq!(snapshot.trailing_pe, 18.0);
        assert_eq!(snapshot.week52_high, 60.0);
        assert_eq!(snapshot.week52_low, 40.0);
        assert_eq!(snapshot.beta, 0.0);
        assert!(!snapshot.cached);
    }

    #[test]
    fn test_chain_shape() {
        let chain = SyntheticGenerator::default().option_chain("ZZZZ", None, now());

        assert_eq!(chain.expirations.len(), 3);
        assert_eq!(chain.selected_expiration, chain.expirations[0]);
        assert_eq!(
            chain.expirations[0],
            (now() + Duration::days(14)).timestamp()
        );
        assert_eq!(chain.calls.len(), 7);
        assert_eq!(chain.puts.len(), 7);

        let strikes: Vec<f64> = chain.calls.iter().map(|o| o.strike()).collect();
        assert_eq!(strikes, vec![35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0]);
        assert_eq!(chain.provenance, Provenance::Synthetic);
    }

    #[test]
    fn test_requested_expiration_is_used() {
        let requested = (now() + Duration::days(28)).timestamp();
        let chain = SyntheticGenerator::default().option_chain("ZZZZ", Some(requested), now());
        assert_eq!(chain.selected_expiration, requested);
        assert!(chain.calls[0].contract_symbol().contains(&requested.to_string()));
    }

    #[test]
    fn test_contract_pricing_heuristic() {
        let chain = SyntheticGenerator::default().option_chain("ZZZZ", None, now());

        let atm_call = chain.calls.iter().find(|o| o.strike() == 50.0).unwrap();
        assert_eq!(atm_call.contract.bid, 2.5);
        assert_eq!(atm_call.contract.ask, 2.6);
        assert!((atm_call.contract.implied_volatility - 0.2).abs() < 1e-12);

        let far_put = chain.puts.iter().find(|o| o.strike() == 35.0).unwrap();
        assert_eq!(far_put.contract.bid, 0.2);
        assert!(!far_put.contract.in_the_money);

        let itm_put = chain.puts.iter().find(|o| o.strike() == 65.0).unwrap();
        assert!(itm_put.contract.in_the_money);
        assert_eq!(itm_put.contract_symbol(), format!("ZZZZ{}P65", chain.selected_expiration));
    }

    #[test]
    fn test_highlights_are_subsets_of_chain() {
        let chain = SyntheticGenerator::default().option_chain("ZZZZ", None, now());
        let highlights = &chain.highlighted_trades;

        assert_eq!(highlights.otm_puts_high_premium.len(), 3);
        assert_eq!(highlights.otm_calls_iv_crush.len(), 3);
        for pick in &highlights.otm_puts_high_premium {
            assert!(chain.puts.iter().any(|p| p.contract_symbol() == pick.contract_symbol()));
        }
        for pick in &highlights.otm_calls_iv_crush {
            assert!(chain.calls.iter().any(|c| c.contract_symbol() == pick.contract_symbol()));
        }
    }

    #[test]
    fn test_strike_code_drops_decimal_point() {
        assert_eq!(strike_code(105.0), "105");
        assert_eq!(strike_code(102.5), "1025");
    }
}
