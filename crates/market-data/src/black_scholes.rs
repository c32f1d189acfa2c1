use std::f64::consts::PI;
use crate::types::{BSInputs, Greeks, OptionType};

/// Rate used when the caller does not configure one
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.045;
pub const DAYS_PER_YEAR: f64 = 365.0;

pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Cumulative normal via the Abramowitz-Stegun 26.2.17 polynomial
/// (absolute error below 7.5e-8). Symmetric by construction.
pub fn norm_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + 0.2316419 * x.abs());
    let poly = k * (0.319381530
        + k * (-0.356563782
        + k * (1.781477937
        + k * (-1.821255978
        + k * 1.330274429))));

    let approx = 1.0 - norm_pdf(x) * poly;

    if x >= 0.0 {
        approx
    } else {
        1.0 - approx
    }
}

pub fn d1_d2(input: &BSInputs) -> (f64, f64) {
    let s = input.spot;
    let k = input.strike;
    let t = input.time;
    let v = input.vol;
    let r = input.rate;

    let vol_sqrt_t = v * t.sqrt();
    let d1 = ((s / k).ln() + (r + 0.5 * v * v) * t) / vol_sqrt_t;
    let d2 = d1 - vol_sqrt_t;

    (d1, d2)
}

/// Closed-form greeks for one European contract.
///
/// Returns `None` for degenerate inputs (zero or negative spot, strike,
/// volatility or time, or any non-finite value). Theta is per calendar day,
/// vega per volatility point and rho per percentage point of rate.
pub fn black_scholes_greeks(input: BSInputs) -> Option<Greeks> {
    if input.is_degenerate() {
        return None;
    }

    let (d1, d2) = d1_d2(&input);
    let s = input.spot;
    let k = input.strike;
    let t = input.time;
    let v = input.vol;
    let r = input.rate;

    let pdf = norm_pdf(d1);
    let sqrt_t = t.sqrt();
    let discount = (-r * t).exp();

    let delta = match input.option_type {
        OptionType::Call => norm_cdf(d1),
        OptionType::Put => norm_cdf(d1) - 1.0,
    };

    let gamma = pdf / (s * v * sqrt_t);

    let vega = s * pdf * sqrt_t / 100.0;

    let decay = -(s * pdf * v) / (2.0 * sqrt_t);
    let theta = match input.option_type {
        OptionType::Call => decay - r * k * discount * norm_cdf(d2),
        OptionType::Put => decay + r * k * discount * norm_cdf(-d2),
    } / DAYS_PER_YEAR;

    let rho = match input.option_type {
        OptionType::Call => k * t * discount * norm_cdf(d2),
        OptionType::Put => -k * t * discount * norm_cdf(-d2),
    } / 100.0;

    let probability_itm = match input.option_type {
        OptionType::Call => norm_cdf(d2),
        OptionType::Put => norm_cdf(-d2),
    };

    Some(Greeks {
        delta,
        gamma,
        vega,
        theta,
        rho,
        probability_itm,
    })
}

/// Greeks at [`DEFAULT_RISK_FREE_RATE`]; `time` is in years.
pub fn price(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    vol: f64,
    time: f64,
) -> Option<Greeks> {
    black_scholes_greeks(BSInputs {
        spot,
        strike,
        time,
        vol,
        rate: DEFAULT_RISK_FREE_RATE,
        option_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atm(option_type: OptionType) -> Greeks {
        price(option_type, 100.0, 100.0, 0.2, 30.0 / 365.0).unwrap()
    }

    #[test]
    fn test_zero_spot_yields_no_greeks() {
        assert!(price(OptionType::Call, 0.0, 100.0, 0.2, 0.1).is_none());
        assert!(price(OptionType::Put, 0.0, 100.0, 0.2, 0.1).is_none());
    }

    #[test]
    fn test_zero_vol_or_time_yields_no_greeks() {
        assert!(price(OptionType::Call, 100.0, 100.0, 0.0, 0.1).is_none());
        assert!(price(OptionType::Call, 100.0, 100.0, 0.2, 0.0).is_none());
        assert!(price(OptionType::Call, 100.0, 0.0, 0.2, 0.1).is_none());
    }

    #[test]
    fn test_call_delta_between_zero_and_one() {
        let call = atm(OptionType::Call);
        assert!(call.delta > 0.0 && call.delta < 1.0);
        assert!(call.delta > 0.5 && call.delta < 0.6);
    }

    #[test]
    fn test_put_call_delta_parity() {
        let call = atm(OptionType::Call);
        let put = atm(OptionType::Put);
        assert!((put.delta - (call.delta - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_probability_itm_sums_to_one() {
        let call = atm(OptionType::Call);
        let put = atm(OptionType::Put);
        assert!((call.probability_itm + put.probability_itm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_gamma_and_vega_shared_between_call_and_put() {
        let call = atm(OptionType::Call);
        let put = atm(OptionType::Put);
        assert!(call.gamma > 0.0);
        assert!((call.gamma - put.gamma).abs() < 1e-12);
        assert!((call.vega - put.vega).abs() < 1e-12);
    }

    #[test]
    fn test_vega_is_per_vol_point() {
        // S * pdf(d1) * sqrt(t) / 100 with d1 ≈ 0.093
        let call = atm(OptionType::Call);
        assert!(call.vega > 0.10 && call.vega < 0.13, "vega = {}", call.vega);
    }

    #[test]
    fn test_theta_negative_long_call() {
        let call = atm(OptionType::Call);
        assert!(call.theta < 0.0);
        // Daily decay on a 100 strike, 20 vol, one-month option is a few cents
        assert!(call.theta > -0.1);
    }

    #[test]
    fn test_rho_signs_and_parity() {
        let t = 30.0 / 365.0;
        let call = atm(OptionType::Call);
        let put = atm(OptionType::Put);
        assert!(call.rho > 0.0);
        assert!(put.rho < 0.0);

        let expected = 100.0 * t * (-DEFAULT_RISK_FREE_RATE * t).exp() / 100.0;
        assert!((call.rho - put.rho - expected).abs() < 1e-9);
    }

    #[test]
    fn test_deep_itm_call_delta_near_one() {
        let greeks = price(OptionType::Call, 200.0, 100.0, 0.2, 30.0 / 365.0).unwrap();
        assert!(greeks.delta > 0.99);
        assert!(greeks.probability_itm > 0.99);
    }

    #[test]
    fn test_norm_cdf_symmetry() {
        for x in [0.1, 0.5, 1.0, 1.96, 3.0] {
            assert!((norm_cdf(-x) - (1.0 - norm_cdf(x))).abs() < 1e-12);
        }
    }

    #[test]
    fn test_norm_cdf_accuracy() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.0) - 0.841_344_746).abs() < 1e-6);
        assert!((norm_cdf(-1.96) - 0.024_997_895).abs() < 1e-6);
        assert!((norm_cdf(2.5) - 0.993_790_335).abs() < 1e-6);
    }

    #[test]
    fn test_norm_cdf_monotonic() {
        let mut previous = norm_cdf(-8.0);
        let mut x = -8.0;
        while x <= 8.0 {
            let current = norm_cdf(x);
            assert!(current >= previous, "not monotonic at {}", x);
            previous = current;
            x += 0.01;
        }
    }

    #[test]
    fn test_norm_cdf_extreme() {
        assert!((norm_cdf(10.0) - 1.0).abs() < 1e-10);
        assert!(norm_cdf(-10.0).abs() < 1e-10);
    }
}
