//! Trade-idea shortlists drawn from a normalized chain.

use crate::types::{HighlightedTrades, NormalizedOption};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

pub const HIGHLIGHT_LIMIT: usize = 5;

/// OTM puts (strike below the underlying, not flagged in the money) with the
/// richest premium per day first.
pub fn otm_puts_high_premium(
    puts: &[NormalizedOption],
    underlying_price: f64,
    limit: usize,
) -> Vec<NormalizedOption> {
    let mut picks: Vec<NormalizedOption> = puts
        .iter()
        .filter(|o| o.strike() < underlying_price && !o.contract.in_the_money)
        .cloned()
        .collect();

    picks.sort_by_key(|o| Reverse(OrderedFloat(o.premium_per_day)));
    picks.truncate(limit);
    picks
}

/// OTM calls (strike above the underlying, not flagged in the money) with the
/// highest implied volatility first; composite score breaks ties.
pub fn otm_calls_iv_crush(
    calls: &[NormalizedOption],
    underlying_price: f64,
    limit: usize,
) -> Vec<NormalizedOption> {
    let mut picks: Vec<NormalizedOption> = calls
        .iter()
        .filter(|o| o.strike() > underlying_price && !o.contract.in_the_money)
        .cloned()
        .collect();

    picks.sort_by_key(|o| {
        (
            Reverse(OrderedFloat(o.contract.implied_volatility)),
            Reverse(o.composite_score),
        )
    });
    picks.truncate(limit);
    picks
}

pub fn select_highlights(
    calls: &[NormalizedOption],
    puts: &[NormalizedOption],
    underlying_price: f64,
) -> HighlightedTrades {
    HighlightedTrades {
        otm_puts_high_premium: otm_puts_high_premium(puts, underlying_price, HIGHLIGHT_LIMIT),
        otm_calls_iv_crush: otm_calls_iv_crush(calls, underlying_price, HIGHLIGHT_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::OptionNormalizer;
    use crate::types::{OptionType, RawOptionContract};
    use chrono::{Duration, TimeZone, Utc};

    const UNDERLYING: f64 = 100.0;

    fn option(
        strike: f64,
        option_type: OptionType,
        bid: f64,
        iv: f64,
        in_the_money: bool,
    ) -> NormalizedOption {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let expiry = (now + Duration::days(30)).timestamp();
        OptionNormalizer::default().normalize(
            RawOptionContract {
                contract_symbol: format!("X{}{}", option_type.code(), strike),
                strike,
                bid,
                ask: bid + 0.1,
                implied_volatility: iv,
                open_interest: 100,
                volume: 10,
                in_the_money,
                option_type,
            },
            UNDERLYING,
            expiry,
            now,
        )
    }

    #[test]
    fn test_empty_chain_yields_empty_shortlists() {
        let highlights = select_highlights(&[], &[], UNDERLYING);
        assert!(highlights.otm_puts_high_premium.is_empty());
        assert!(highlights.otm_calls_iv_crush.is_empty());
    }

    #[test]
    fn test_puts_filtered_and_ranked_by_premium() {
        let puts = vec![
            option(90.0, OptionType::Put, 0.5, 0.3, false),
            option(95.0, OptionType::Put, 1.5, 0.3, false),
            option(97.0, OptionType::Put, 1.0, 0.3, true),
            option(105.0, OptionType::Put, 6.0, 0.3, false),
        ];

        let picks = otm_puts_high_premium(&puts, UNDERLYING, HIGHLIGHT_LIMIT);
        let strikes: Vec<f64> = picks.iter().map(|o| o.strike()).collect();
        assert_eq!(strikes, vec![95.0, 90.0]);
    }

    #[test]
    fn test_calls_ranked_by_iv_then_score() {
        let calls = vec![
            option(95.0, OptionType::Call, 6.0, 0.9, true),
            option(105.0, OptionType::Call, 1.0, 0.4, false),
            option(110.0, OptionType::Call, 0.5, 0.6, false),
            // Same IV as 110 but a richer premium, so a higher composite score
            option(115.0, OptionType::Call, 2.0, 0.6, false),
        ];

        let picks = otm_calls_iv_crush(&calls, UNDERLYING, HIGHLIGHT_LIMIT);
        let strikes: Vec<f64> = picks.iter().map(|o| o.strike()).collect();
        assert!(picks[0].composite_score > picks[1].composite_score);
        assert_eq!(strikes, vec![115.0, 110.0, 105.0]);
    }

    #[test]
    fn test_at_the_money_strike_excluded_from_both() {
        let calls = vec![option(100.0, OptionType::Call, 2.0, 0.3, false)];
        let puts = vec![option(100.0, OptionType::Put, 2.0, 0.3, false)];
        let highlights = select_highlights(&calls, &puts, UNDERLYING);
        assert!(highlights.otm_calls_iv_crush.is_empty());
        assert!(highlights.otm_puts_high_premium.is_empty());
    }

    #[test]
    fn test_limit_applies() {
        let puts: Vec<NormalizedOption> = (0..8)
            .map(|i| option(80.0 + i as f64, OptionType::Put, 0.2 + i as f64 * 0.1, 0.3, false))
            .collect();

        let picks = otm_puts_high_premium(&puts, UNDERLYING, HIGHLIGHT_LIMIT);
        assert_eq!(picks.len(), HIGHLIGHT_LIMIT);
        assert_eq!(picks[0].strike(), 87.0);
    }
}
