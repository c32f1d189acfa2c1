//! Market data retriever
//!
//! Orchestrates every lookup:
//! - Cache first, keyed per ticker (and per requested expiry for chains)
//! - Upstream only while the availability gate allows it, bounded by a timeout
//! - Synthetic data whenever the upstream cannot answer, unless the
//!   fallback policy is strict
//!
//! Every result is tagged with its provenance and whether it came from cache.

use crate::cache::{fundamentals_key, options_key, CacheConfig, TtlCache};
use crate::circuit_breaker::{GateConfig, GateStatus, UpstreamGate};
use crate::clock::{system_clock, SharedClock};
use crate::error::MarketDataError;
use crate::highlights::select_highlights;
use crate::normalizer::OptionNormalizer;
use crate::provider::{ContractRecord, MarketDataProvider, OptionChainRecord, QuoteRecord};
use crate::synthetic::SyntheticGenerator;
use crate::types::{
    FundamentalsSnapshot, OptionChainResult, OptionType, Provenance, RawOptionContract,
};
use crate::Result;
use chrono::{DateTime, Utc};
use observability::EngineMetrics;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const FUNDAMENTALS: &str = "fundamentals";
const OPTIONS: &str = "options";

/// What to do when the upstream cannot answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Serve synthetic data
    #[default]
    Resilient,
    /// Return the upstream error; `DataNotAvailable` while the gate is open
    Strict,
}

impl From<config::FallbackPolicySetting> for FallbackPolicy {
    fn from(setting: config::FallbackPolicySetting) -> Self {
        match setting {
            config::FallbackPolicySetting::Resilient => Self::Resilient,
            config::FallbackPolicySetting::Strict => Self::Strict,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FallbackReason {
    GateOpen,
    UpstreamError,
}

impl FallbackReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::GateOpen => "gate_open",
            Self::UpstreamError => "upstream_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieverConfig {
    pub cache: CacheConfig,
    pub gate: GateConfig,
    pub risk_free_rate: f64,
    pub upstream_timeout: Duration,
    pub fallback_policy: FallbackPolicy,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            gate: GateConfig::default(),
            risk_free_rate: crate::black_scholes::DEFAULT_RISK_FREE_RATE,
            upstream_timeout: Duration::from_secs(8),
            fallback_policy: FallbackPolicy::Resilient,
        }
    }
}

impl From<&config::AppConfig> for RetrieverConfig {
    fn from(config: &config::AppConfig) -> Self {
        Self {
            cache: CacheConfig::from(&config.cache),
            gate: GateConfig::from(&config.circuit_breaker),
            risk_free_rate: config.pricing.risk_free_rate,
            upstream_timeout: Duration::from_millis(config.upstream.timeout_ms),
            fallback_policy: FallbackPolicy::from(config.fallback.policy),
        }
    }
}

/// Resolve dividend rate and yield (percent) from whatever the quote carried.
///
/// Rate falls back to the trailing annual rate, yield to the trailing annual
/// yield. A yield strictly between 0 and 1 is a fraction and is scaled to
/// percent. A missing side is derived from the other one and the price.
pub fn normalize_dividend(quote: &QuoteRecord, price: f64) -> (f64, f64) {
    let mut rate = quote
        .dividend_rate
        .or(quote.trailing_dividend_rate)
        .unwrap_or(0.0);
    let raw_yield = quote
        .dividend_yield
        .or(quote.trailing_dividend_yield)
        .unwrap_or(0.0);

    let mut dividend_yield = if raw_yield > 0.0 && raw_yield < 1.0 {
        raw_yield * 100.0
    } else {
        raw_yield
    };

    if rate == 0.0 && dividend_yield > 0.0 && price > 0.0 {
        rate = price * (dividend_yield / 100.0);
    }
    if rate > 0.0 && dividend_yield == 0.0 && price > 0.0 {
        dividend_yield = (rate / price) * 100.0;
    }

    (rate, dividend_yield)
}

fn build_snapshot(
    symbol: &str,
    quote: QuoteRecord,
    now: DateTime<Utc>,
) -> Result<FundamentalsSnapshot> {
    let price = quote
        .price
        .filter(|p| p.is_finite())
        .ok_or_else(|| MarketDataError::Malformed(format!("quote for {} has no price", symbol)))?;
    let (dividend_rate, dividend_yield) = normalize_dividend(&quote, price);

    let display_name = quote
        .short_name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| quote.long_name.clone().filter(|n| !n.is_empty()))
        .unwrap_or_else(|| symbol.to_string());

    let mut snapshot = FundamentalsSnapshot::new(symbol, Provenance::Real, now);
    snapshot.display_name = display_name;
    snapshot.quote_type = quote
        .quote_type
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "EQUITY".to_string());
    snapshot.price = price;
    snapshot.open = quote.open.unwrap_or(0.0);
    snapshot.day_high = quote.day_high.unwrap_or(0.0);
    snapshot.day_low = quote.day_low.unwrap_or(0.0);
    snapshot.volume = quote.volume.unwrap_or(0.0);
    snapshot.previous_close = quote.previous_close.unwrap_or(0.0);
    snapshot.day_change = quote.day_change.unwrap_or(0.0);
    snapshot.day_change_percent = quote.day_change_percent.unwrap_or(0.0);
    snapshot.eps = quote.eps.unwrap_or(0.0);
    snapshot.beta = quote.beta.unwrap_or(0.0);
    snapshot.dividend_rate = dividend_rate;
    snapshot.dividend_yield = dividend_yield;
    snapshot.revenue = quote.revenue.unwrap_or(0.0);
    snapshot.net_income = quote.net_income.unwrap_or(0.0);
    snapshot.market_cap = quote.market_cap.unwrap_or(0.0);
    snapshot.trailing_pe = quote.trailing_pe.unwrap_or(0.0);
    snapshot.forward_pe = quote.forward_pe.unwrap_or(0.0);
    snapshot.week52_high = quote.week52_high.unwrap_or(0.0);
    snapshot.week52_low = quote.week52_low.unwrap_or(0.0);
    snapshot.fifty_day_avg = quote.fifty_day_avg.unwrap_or(0.0);
    snapshot.two_hundred_day_avg = quote.two_hundred_day_avg.unwrap_or(0.0);
    snapshot.avg_volume = quote.avg_volume.unwrap_or(0.0);
    Ok(snapshot)
}

/// Contracts without a symbol or a usable strike are dropped
fn to_raw_contract(record: ContractRecord, option_type: OptionType) -> Option<RawOptionContract> {
    let contract_symbol = record.contract_symbol.filter(|s| !s.is_empty())?;
    let strike = record.strike.filter(|k| k.is_finite() && *k > 0.0)?;
    let count = |value: Option<f64>| {
        value
            .filter(|v| v.is_finite())
            .map_or(0, |v| v.max(0.0) as u64)
    };

    Some(RawOptionContract {
        contract_symbol,
        strike,
        bid: record.bid.unwrap_or(0.0),
        ask: record.ask.unwrap_or(0.0),
        implied_volatility: record.implied_volatility.unwrap_or(0.0),
        open_interest: count(record.open_interest),
        volume: count(record.volume),
        in_the_money: record.in_the_money.unwrap_or(false),
        option_type,
    })
}

fn normalize_symbol(ticker: &str) -> Result<String> {
    let symbol = ticker.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(MarketDataError::InvalidSymbol(ticker.to_string()));
    }
    Ok(symbol)
}

/// Cache-first, gate-guarded market data lookups with synthetic fallback
pub struct MarketDataRetriever {
    provider: Arc<dyn MarketDataProvider>,
    fundamentals_cache: Arc<TtlCache<FundamentalsSnapshot>>,
    options_cache: Arc<TtlCache<OptionChainResult>>,
    gate: UpstreamGate,
    normalizer: OptionNormalizer,
    synthetic: SyntheticGenerator,
    clock: SharedClock,
    config: RetrieverConfig,
    in_flight: InFlightMap,
    metrics: EngineMetrics,
}

impl MarketDataRetriever {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: RetrieverConfig) -> Self {
        Self::with_clock(provider, config, system_clock())
    }

    pub fn with_clock(
        provider: Arc<dyn MarketDataProvider>,
        config: RetrieverConfig,
        clock: SharedClock,
    ) -> Self {
        let normalizer = OptionNormalizer::new(config.risk_free_rate);

        info!(
            provider = provider.name(),
            fundamentals_ttl_secs = config.cache.fundamentals_ttl.as_secs(),
            options_ttl_secs = config.cache.options_ttl.as_secs(),
            failure_threshold = config.gate.failure_threshold,
            policy = ?config.fallback_policy,
            "Market data retriever initialized"
        );

        Self {
            provider,
            fundamentals_cache: Arc::new(TtlCache::new(
                FUNDAMENTALS,
                config.cache.fundamentals_ttl,
                clock.clone(),
            )),
            options_cache: Arc::new(TtlCache::new(
                OPTIONS,
                config.cache.options_ttl,
                clock.clone(),
            )),
            gate: UpstreamGate::new(config.gate, clock.clone()),
            normalizer,
            synthetic: SyntheticGenerator::new(normalizer),
            clock,
            config,
            in_flight: parking_lot::Mutex::new(HashMap::new()),
            metrics: EngineMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn gate(&self) -> &UpstreamGate {
        &self.gate
    }

    pub fn gate_status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Start background sweeps on both caches. Empty when sweeping is disabled.
    pub fn spawn_sweepers(&self) -> Vec<JoinHandle<()>> {
        let period = self.config.cache.sweep_interval;
        [
            self.fundamentals_cache.spawn_sweeper(period),
            self.options_cache.spawn_sweeper(period),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn purge_expired(&self) -> usize {
        self.fundamentals_cache.purge_expired() + self.options_cache.purge_expired()
    }

    // ==================== Fundamentals ====================

    pub async fn get_fundamentals(&self, ticker: &str) -> Result<FundamentalsSnapshot> {
        let symbol = normalize_symbol(ticker)?;
        let key = fundamentals_key(&symbol);

        if let Some(hit) = self.cached_fundamentals(&key, &symbol) {
            return Ok(hit);
        }

        self.single_flight(&key, self.fetch_fundamentals(&symbol, &key))
            .await
    }

    fn cached_fundamentals(&self, key: &str, symbol: &str) -> Option<FundamentalsSnapshot> {
        let mut hit = self.fundamentals_cache.get(key)?;
        self.metrics.cache_hit(FUNDAMENTALS);
        debug!(ticker = %symbol, "Cache hit for fundamentals");
        hit.cached = true;
        Some(hit)
    }

    async fn fetch_fundamentals(&self, symbol: &str, key: &str) -> Result<FundamentalsSnapshot> {
        // Another caller may have filled the cache while this one waited
        if let Some(hit) = self.cached_fundamentals(key, symbol) {
            return Ok(hit);
        }
        self.metrics.cache_miss(FUNDAMENTALS);

        if !self.upstream_allowed() {
            return self.fallback_fundamentals(symbol, FallbackReason::GateOpen, None);
        }

        info!(ticker = %symbol, provider = self.provider.name(), "Fetching fundamentals");
        let fetched = self
            .call_upstream(FUNDAMENTALS, self.provider.quote(symbol))
            .await
            .and_then(|quote| build_snapshot(symbol, quote, self.clock.now()));

        match fetched {
            Ok(snapshot) => {
                self.gate.record_success();
                self.fundamentals_cache.set(key, snapshot.clone());
                debug!(ticker = %symbol, price = snapshot.price, "Cached fundamentals");
                Ok(snapshot)
            }
            Err(err) => {
                self.record_upstream_failure(FUNDAMENTALS, symbol, &err);
                self.fallback_fundamentals(symbol, FallbackReason::UpstreamError, Some(err))
            }
        }
    }

    fn fallback_fundamentals(
        &self,
        symbol: &str,
        reason: FallbackReason,
        error: Option<MarketDataError>,
    ) -> Result<FundamentalsSnapshot> {
        self.check_policy(symbol, error)?;
        self.metrics.fallback(FUNDAMENTALS, reason.as_str());
        warn!(ticker = %symbol, reason = reason.as_str(), "Serving synthetic fundamentals");
        Ok(self.synthetic.fundamentals(symbol, self.clock.now()))
    }

    // ==================== Option chains ====================

    /// Chain for `expiration` (unix seconds), or for the first listed expiry when `None`
    pub async fn get_options_chain(
        &self,
        ticker: &str,
        expiration: Option<i64>,
    ) -> Result<OptionChainResult> {
        let symbol = normalize_symbol(ticker)?;
        let key = options_key(&symbol, expiration);

        if let Some(hit) = self.cached_chain(&key, &symbol) {
            return Ok(hit);
        }

        self.single_flight(&key, self.fetch_chain(&symbol, expiration, &key))
            .await
    }

    fn cached_chain(&self, key: &str, symbol: &str) -> Option<OptionChainResult> {
        let mut hit = self.options_cache.get(key)?;
        self.metrics.cache_hit(OPTIONS);
        debug!(ticker = %symbol, key, "Cache hit for option chain");
        hit.cached = true;
        Some(hit)
    }

    async fn fetch_chain(
        &self,
        symbol: &str,
        expiration: Option<i64>,
        key: &str,
    ) -> Result<OptionChainResult> {
        if let Some(hit) = self.cached_chain(key, symbol) {
            return Ok(hit);
        }
        self.metrics.cache_miss(OPTIONS);

        if !self.upstream_allowed() {
            return self.fallback_chain(symbol, expiration, FallbackReason::GateOpen, None);
        }

        info!(
            ticker = %symbol,
            ?expiration,
            provider = self.provider.name(),
            "Fetching option chain"
        );
        match self.load_chain(symbol, expiration).await {
            Ok(chain) => {
                self.gate.record_success();
                self.options_cache.set(key, chain.clone());
                debug!(
                    ticker = %symbol,
                    calls = chain.calls.len(),
                    puts = chain.puts.len(),
                    "Cached option chain"
                );
                Ok(chain)
            }
            Err(err) => {
                self.record_upstream_failure(OPTIONS, symbol, &err);
                self.fallback_chain(symbol, expiration, FallbackReason::UpstreamError, Some(err))
            }
        }
    }

    async fn load_chain(&self, symbol: &str, expiration: Option<i64>) -> Result<OptionChainResult> {
        let mut record = self
            .call_upstream(OPTIONS, self.provider.option_chain(symbol, expiration))
            .await?;

        let mut expirations = record.expirations.clone();
        expirations.sort_unstable();
        expirations.dedup();

        let selected = expiration
            .or_else(|| expirations.first().copied())
            .or(record.contracts_expiration)
            .ok_or_else(|| {
                MarketDataError::Malformed(format!("chain for {} lists no expiries", symbol))
            })?;

        let wrong_expiry = record
            .contracts_expiration
            .is_some_and(|listed| listed != selected);
        if !record.has_contracts() || wrong_expiry {
            debug!(ticker = %symbol, selected, "Requesting contracts for selected expiry");
            let second: OptionChainRecord = self
                .call_upstream(OPTIONS, self.provider.option_chain(symbol, Some(selected)))
                .await?;
            record.calls = second.calls;
            record.puts = second.puts;
            record.underlying_price = record.underlying_price.or(second.underlying_price);
        }

        let underlying = record
            .underlying_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                MarketDataError::Malformed(format!("chain for {} has no underlying price", symbol))
            })?;

        let now = self.clock.now();
        let side = |contracts: Vec<ContractRecord>, option_type: OptionType| {
            let raw = contracts
                .into_iter()
                .filter_map(|c| to_raw_contract(c, option_type))
                .collect();
            self.normalizer.normalize_side(raw, underlying, selected, now)
        };
        let calls = side(record.calls, OptionType::Call);
        let puts = side(record.puts, OptionType::Put);

        if calls.is_empty() && puts.is_empty() {
            return Err(MarketDataError::Malformed(format!(
                "chain for {} has no usable contracts",
                symbol
            )));
        }

        let highlighted_trades = select_highlights(&calls, &puts, underlying);

        Ok(OptionChainResult {
            ticker: symbol.to_string(),
            underlying_price: underlying,
            expirations,
            selected_expiration: selected,
            calls,
            puts,
            highlighted_trades,
            provenance: Provenance::Real,
            cached: false,
            captured_at: now,
        })
    }

    fn fallback_chain(
        &self,
        symbol: &str,
        expiration: Option<i64>,
        reason: FallbackReason,
        error: Option<MarketDataError>,
    ) -> Result<OptionChainResult> {
        self.check_policy(symbol, error)?;
        self.metrics.fallback(OPTIONS, reason.as_str());
        warn!(ticker = %symbol, reason = reason.as_str(), "Serving synthetic option chain");
        Ok(self.synthetic.option_chain(symbol, expiration, self.clock.now()))
    }

    // ==================== Upstream plumbing ====================

    fn upstream_allowed(&self) -> bool {
        let available = self.gate.is_available();
        self.metrics.set_gate_open(!available);
        if !available {
            debug!(provider = self.provider.name(), "Upstream suspended");
        }
        available
    }

    async fn call_upstream<T>(
        &self,
        dataset: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let mut timer = self.metrics.upstream_timer(dataset);
        let limit = self.config.upstream_timeout;

        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => {
                timer.succeeded();
                Ok(value)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(MarketDataError::Timeout(
                u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    fn record_upstream_failure(&self, dataset: &'static str, symbol: &str, err: &MarketDataError) {
        self.metrics.upstream_failure(dataset);
        warn!(
            ticker = %symbol,
            dataset,
            kind = err.kind(),
            error = %err,
            provider = self.provider.name(),
            "Upstream call failed"
        );
        if self.gate.record_failure(err.kind()) {
            self.metrics.set_gate_open(true);
        }
    }

    /// Under the strict policy, turn a would-be fallback into an error
    fn check_policy(&self, symbol: &str, error: Option<MarketDataError>) -> Result<()> {
        match self.config.fallback_policy {
            FallbackPolicy::Resilient => Ok(()),
            FallbackPolicy::Strict => Err(error.unwrap_or_else(|| {
                MarketDataError::DataNotAvailable(format!(
                    "upstream suspended, no data for {}",
                    symbol
                ))
            })),
        }
    }

    /// Run `work` while holding the per-key lock so concurrent misses on the
    /// same key reach the upstream once.
    async fn single_flight<T>(&self, key: &str, work: impl Future<Output = T>) -> T {
        let slot = InFlightSlot::acquire(&self.in_flight, key);
        let _turn = slot.lock.lock().await;
        work.await
    }
}

type InFlightMap = parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// One caller's handle on a per-key lock. Dropping it, including when the
/// caller's future is cancelled, removes the map entry once no one else holds it.
struct InFlightSlot<'a> {
    map: &'a InFlightMap,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InFlightSlot<'a> {
    fn acquire(map: &'a InFlightMap, key: &'a str) -> Self {
        let lock = map.lock().entry(key.to_string()).or_default().clone();
        Self { map, key, lock }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock();
        // The map and this handle are the only owners once no one else is waiting
        let last = Arc::strong_count(&self.lock) <= 2;
        if last && map.get(self.key).is_some_and(|held| Arc::ptr_eq(held, &self.lock)) {
            map.remove(self.key);
        }
    }
}
