//! Yahoo Finance v7 provider
//!
//! Quotes come from `/v7/finance/quote?symbols=`, chains from
//! `/v7/finance/options/{symbol}` with an optional `date=` expiry filter.
//!
//! Both endpoints require a session cookie plus a matching `crumb` query
//! parameter. The crumb is fetched lazily from `/v1/test/getcrumb` after
//! visiting the session host, then reused until the upstream answers 401.

use super::traits::{ContractRecord, MarketDataProvider, OptionChainRecord, QuoteRecord};
use crate::error::MarketDataError;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Longest error body kept in a provider error message
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YahooConfig {
    pub base_url: String,
    pub session_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl From<&config::UpstreamConfig> for YahooConfig {
    fn from(upstream: &config::UpstreamConfig) -> Self {
        Self {
            base_url: upstream.base_url.clone(),
            session_url: upstream.session_url.clone(),
            timeout: Duration::from_millis(upstream.timeout_ms),
            user_agent: upstream.user_agent.clone(),
        }
    }
}

/// HTTP-based Yahoo Finance client
pub struct YahooProvider {
    client: Client,
    base_url: Url,
    session_url: Url,
    timeout: Duration,
    crumb: Mutex<Option<String>>,
}

impl YahooProvider {
    pub fn new(config: YahooConfig) -> Result<Self> {
        let base_url = parse_url(config.base_url.trim_end_matches('/'), "base")?;
        let session_url = parse_url(&config.session_url, "session")?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()
            .map_err(|e| MarketDataError::Connection(e.to_string()))?;

        info!(
            base_url = %base_url,
            timeout_ms = config.timeout.as_millis() as u64,
            "Yahoo provider ready"
        );

        Ok(Self {
            client,
            base_url,
            session_url,
            timeout: config.timeout,
            crumb: Mutex::new(None),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                MarketDataError::Provider(format!("base url {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport_error(&self, err: reqwest::Error) -> MarketDataError {
        if err.is_timeout() {
            MarketDataError::Timeout(self.timeout.as_millis() as u64)
        } else if err.is_decode() {
            MarketDataError::Malformed(err.to_string())
        } else {
            MarketDataError::Connection(err.to_string())
        }
    }

    /// Cached crumb, fetching a fresh one when none is held
    async fn crumb(&self) -> Result<String> {
        let mut slot = self.crumb.lock().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }

        let crumb = self.fetch_crumb().await?;
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // The session host answers 404 but still sets the cookie
        self.client
            .get(self.session_url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let url = self.endpoint(&["v1", "test", "getcrumb"])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        let crumb = parse_crumb(status, &body)?;
        debug!("Obtained Yahoo crumb");
        Ok(crumb)
    }

    async fn send(&self, url: &Url, query: &[(&str, String)]) -> Result<Response> {
        let crumb = self.crumb().await?;
        debug!(url = %url, "Requesting upstream");

        self.client
            .get(url.clone())
            .query(query)
            .query(&[("crumb", crumb)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        let mut response = self.send(&url, query).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Yahoo rejected the crumb, refreshing session");
            *self.crumb.lock().await = None;
            response = self.send(&url, query).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| MarketDataError::Malformed(e.to_string()))
    }
}

fn parse_url(raw: &str, which: &str) -> Result<Url> {
    Url::parse(raw)
        .map_err(|e| MarketDataError::Provider(format!("invalid {} url {}: {}", which, raw, e)))
}

fn status_error(status: StatusCode, mut body: String) -> MarketDataError {
    body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
    MarketDataError::Provider(format!("HTTP {}: {}", status, body))
}

/// A crumb is a short opaque token; anything else is an error page
fn parse_crumb(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        return Err(status_error(status, body.to_string()));
    }

    let crumb = body.trim();
    let opaque = !crumb.contains(char::is_whitespace) && !crumb.contains('<');
    if crumb.is_empty() || crumb.len() > 64 || !opaque {
        return Err(MarketDataError::Malformed(
            "crumb endpoint returned an unexpected body".to_string(),
        ));
    }
    Ok(crumb.to_string())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn quote(&self, symbol: &str) -> Result<QuoteRecord> {
        let url = self.endpoint(&["v7", "finance", "quote"])?;
        let envelope: QuoteEnvelope = self
            .get_json(url, &[("symbols", symbol.to_string())])
            .await?;
        parse_quote(envelope, symbol)
    }

    async fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<i64>,
    ) -> Result<OptionChainRecord> {
        let url = self.endpoint(&["v7", "finance", "options", symbol])?;
        let query: Vec<(&str, String)> = expiration
            .map(|date| vec![("date", date.to_string())])
            .unwrap_or_default();

        let envelope: ChainEnvelope = self.get_json(url, &query).await?;
        parse_chain(envelope, symbol)
    }
}

// ==================== Wire format ====================

#[derive(Debug, Deserialize)]
struct ResultSet<T> {
    result: Option<Vec<T>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

impl YahooError {
    fn into_error(self) -> MarketDataError {
        MarketDataError::Provider(format!(
            "{}: {}",
            self.code.unwrap_or_else(|| "error".to_string()),
            self.description.unwrap_or_default()
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: Option<ResultSet<YahooQuote>>,
    finance: Option<ResultSet<IgnoredAny>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainEnvelope {
    option_chain: Option<ResultSet<YahooChain>>,
    finance: Option<ResultSet<IgnoredAny>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuote {
    symbol: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    quote_type: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_open: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_previous_close: Option<f64>,
    regular_market_change: Option<f64>,
    regular_market_change_percent: Option<f64>,
    eps_trailing_twelve_months: Option<f64>,
    beta: Option<f64>,
    dividend_rate: Option<f64>,
    trailing_annual_dividend_rate: Option<f64>,
    dividend_yield: Option<f64>,
    trailing_annual_dividend_yield: Option<f64>,
    revenue: Option<f64>,
    market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
    fifty_day_average: Option<f64>,
    two_hundred_day_average: Option<f64>,
    #[serde(rename = "averageDailyVolume3Month")]
    average_daily_volume_3_month: Option<f64>,
}

impl YahooQuote {
    fn into_record(self, requested: &str) -> QuoteRecord {
        QuoteRecord {
            symbol: self.symbol.unwrap_or_else(|| requested.to_string()),
            short_name: self.short_name,
            long_name: self.long_name,
            quote_type: self.quote_type,
            price: self.regular_market_price,
            open: self.regular_market_open,
            day_high: self.regular_market_day_high,
            day_low: self.regular_market_day_low,
            volume: self.regular_market_volume,
            previous_close: self.regular_market_previous_close,
            day_change: self.regular_market_change,
            day_change_percent: self.regular_market_change_percent,
            eps: self.eps_trailing_twelve_months,
            beta: self.beta,
            dividend_rate: self.dividend_rate,
            trailing_dividend_rate: self.trailing_annual_dividend_rate,
            dividend_yield: self.dividend_yield,
            trailing_dividend_yield: self.trailing_annual_dividend_yield,
            revenue: self.revenue,
            net_income: None,
            market_cap: self.market_cap,
            trailing_pe: self.trailing_pe,
            forward_pe: self.forward_pe,
            week52_high: self.fifty_two_week_high,
            week52_low: self.fifty_two_week_low,
            fifty_day_avg: self.fifty_day_average,
            two_hundred_day_avg: self.two_hundred_day_average,
            avg_volume: self.average_daily_volume_3_month,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooChain {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    quote: Option<YahooQuote>,
    #[serde(default)]
    options: Vec<YahooOptionSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooOptionSet {
    expiration_date: Option<i64>,
    #[serde(default)]
    calls: Vec<YahooContract>,
    #[serde(default)]
    puts: Vec<YahooContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooContract {
    contract_symbol: Option<String>,
    strike: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    implied_volatility: Option<f64>,
    open_interest: Option<f64>,
    volume: Option<f64>,
    in_the_money: Option<bool>,
}

impl From<YahooContract> for ContractRecord {
    fn from(c: YahooContract) -> Self {
        Self {
            contract_symbol: c.contract_symbol,
            strike: c.strike,
            bid: c.bid,
            ask: c.ask,
            implied_volatility: c.implied_volatility,
            open_interest: c.open_interest,
            volume: c.volume,
            in_the_money: c.in_the_money,
        }
    }
}

/// Unwrap a `{result, error}` block, surfacing the payload or the upstream error
fn unwrap_results<T>(
    set: Option<ResultSet<T>>,
    finance: Option<ResultSet<IgnoredAny>>,
    section: &str,
) -> Result<Vec<T>> {
    if let Some(error) = finance.and_then(|f| f.error) {
        return Err(error.into_error());
    }

    let set = set.ok_or_else(|| MarketDataError::Malformed(format!("missing {}", section)))?;
    if let Some(error) = set.error {
        return Err(error.into_error());
    }
    Ok(set.result.unwrap_or_default())
}

fn parse_quote(envelope: QuoteEnvelope, symbol: &str) -> Result<QuoteRecord> {
    let quotes = unwrap_results(envelope.quote_response, envelope.finance, "quoteResponse")?;

    let quote = quotes
        .into_iter()
        .find(|q| {
            q.symbol
                .as_deref()
                .map_or(true, |s| s.eq_ignore_ascii_case(symbol))
        })
        .ok_or_else(|| MarketDataError::InvalidSymbol(symbol.to_string()))?;

    Ok(quote.into_record(symbol))
}

fn parse_chain(envelope: ChainEnvelope, symbol: &str) -> Result<OptionChainRecord> {
    let chains = unwrap_results(envelope.option_chain, envelope.finance, "optionChain")?;
    let chain = chains
        .into_iter()
        .next()
        .ok_or_else(|| MarketDataError::InvalidSymbol(symbol.to_string()))?;

    let underlying_price = chain.quote.and_then(|q| q.regular_market_price);
    let (contracts_expiration, calls, puts) = match chain.options.into_iter().next() {
        Some(set) => (
            set.expiration_date,
            set.calls.into_iter().map(ContractRecord::from).collect(),
            set.puts.into_iter().map(ContractRecord::from).collect(),
        ),
        None => (None, Vec::new(), Vec::new()),
    };

    Ok(OptionChainRecord {
        underlying_price,
        expirations: chain.expiration_dates,
        contracts_expiration,
        calls,
        puts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> YahooProvider {
        YahooProvider::new(YahooConfig::from(&config::UpstreamConfig::default())).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_symbol() {
        let url = provider()
            .endpoint(&["v7", "finance", "options", "BF/B"])
            .unwrap();
        assert_eq!(url.path(), "/v7/finance/options/BF%2FB");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = YahooProvider::new(YahooConfig {
            base_url: "not a url".to_string(),
            session_url: "https://fc.yahoo.com".to_string(),
            timeout: Duration::from_secs(1),
            user_agent: "test".to_string(),
        });
        assert!(matches!(result, Err(MarketDataError::Provider(_))));
    }

    #[test]
    fn test_invalid_session_url_rejected() {
        let mut config = YahooConfig::from(&config::UpstreamConfig::default());
        config.session_url = "fc.yahoo.com".to_string();
        assert!(matches!(
            YahooProvider::new(config),
            Err(MarketDataError::Provider(_))
        ));
    }

    #[test]
    fn test_parse_crumb() {
        assert_eq!(
            parse_crumb(StatusCode::OK, "aB3.xY/z9Q\n"),
            Ok("aB3.xY/z9Q".to_string())
        );
    }

    #[test]
    fn test_crumb_error_pages_rejected() {
        assert!(matches!(
            parse_crumb(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"),
            Err(MarketDataError::Provider(message)) if message.contains("429")
        ));
        assert!(matches!(
            parse_crumb(StatusCode::OK, "<html><body>consent</body></html>"),
            Err(MarketDataError::Malformed(_))
        ));
        assert!(matches!(
            parse_crumb(StatusCode::OK, "   "),
            Err(MarketDataError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_crumb_reused_once_cached() {
        let provider = provider();
        *provider.crumb.lock().await = Some("cached".to_string());
        assert_eq!(provider.crumb().await, Ok("cached".to_string()));
    }

    #[test]
    fn test_parse_quote() {
        let body = r#"{
            "quoteResponse": {
                "result": [{
                    "symbol": "AAPL",
                    "shortName": "Apple Inc.",
                    "quoteType": "EQUITY",
                    "regularMarketPrice": 231.5,
                    "regularMarketOpen": 229.0,
                    "regularMarketVolume": 41000000,
                    "epsTrailingTwelveMonths": 6.6,
                    "trailingAnnualDividendRate": 1.0,
                    "trailingAnnualDividendYield": 0.0043,
                    "marketCap": 3500000000000,
                    "trailingPE": 35.1,
                    "forwardPE": 30.2,
                    "fiftyTwoWeekHigh": 260.1,
                    "averageDailyVolume3Month": 52000000
                }],
                "error": null
            }
        }"#;

        let envelope: QuoteEnvelope = serde_json::from_str(body).unwrap();
        let quote = parse_quote(envelope, "AAPL").unwrap();

        assert_eq!(quote.short_name.as_deref(), Some("Apple Inc."));
        assert_eq!(quote.price, Some(231.5));
        assert_eq!(quote.trailing_pe, Some(35.1));
        assert_eq!(quote.forward_pe, Some(30.2));
        assert_eq!(quote.avg_volume, Some(52_000_000.0));
        assert_eq!(quote.trailing_dividend_yield, Some(0.0043));
        assert_eq!(quote.dividend_rate, None);
        assert_eq!(quote.beta, None);
    }

    #[test]
    fn test_parse_quote_unknown_symbol() {
        let body = r#"{"quoteResponse": {"result": [], "error": null}}"#;
        let envelope: QuoteEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(
            parse_quote(envelope, "NOPE"),
            Err(MarketDataError::InvalidSymbol("NOPE".to_string()))
        );
    }

    #[test]
    fn test_parse_finance_error() {
        let body = r#"{"finance": {"result": null,
            "error": {"code": "Unauthorized", "description": "Invalid Crumb"}}}"#;
        let envelope: QuoteEnvelope = serde_json::from_str(body).unwrap();
        match parse_quote(envelope, "AAPL") {
            Err(MarketDataError::Provider(message)) => assert!(message.contains("Invalid Crumb")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_chain() {
        let body = r#"{
            "optionChain": {
                "result": [{
                    "underlyingSymbol": "AAPL",
                    "expirationDates": [1760054400, 1760659200],
                    "strikes": [220.0, 230.0],
                    "quote": {"symbol": "AAPL", "regularMarketPrice": 231.5},
                    "options": [{
                        "expirationDate": 1760054400,
                        "calls": [{
                            "contractSymbol": "AAPL251010C00230000",
                            "strike": 230.0,
                            "bid": 4.1,
                            "ask": 4.3,
                            "impliedVolatility": 0.27,
                            "openInterest": 1520,
                            "volume": 310,
                            "inTheMoney": true
                        }],
                        "puts": [{
                            "contractSymbol": "AAPL251010P00220000",
                            "strike": 220.0,
                            "impliedVolatility": 0.29,
                            "inTheMoney": false
                        }]
                    }]
                }],
                "error": null
            }
        }"#;

        let envelope: ChainEnvelope = serde_json::from_str(body).unwrap();
        let chain = parse_chain(envelope, "AAPL").unwrap();

        assert_eq!(chain.underlying_price, Some(231.5));
        assert_eq!(chain.expirations, vec![1_760_054_400, 1_760_659_200]);
        assert_eq!(chain.contracts_expiration, Some(1_760_054_400));
        assert_eq!(chain.calls.len(), 1);
        assert_eq!(chain.calls[0].open_interest, Some(1520.0));
        assert_eq!(chain.puts[0].bid, None);
        assert!(chain.has_contracts());
    }

    #[test]
    fn test_parse_chain_without_option_sets() {
        let body = r#"{"optionChain": {
            "result": [{"expirationDates": [1760054400], "options": []}],
            "error": null
        }}"#;
        let envelope: ChainEnvelope = serde_json::from_str(body).unwrap();
        let chain = parse_chain(envelope, "AAPL").unwrap();
        assert!(!chain.has_contracts());
        assert_eq!(chain.underlying_price, None);
    }

    #[test]
    fn test_error_body_truncation_respects_char_boundaries() {
        let body = "é".repeat(200);
        let cut = floor_char_boundary(&body, MAX_ERROR_BODY);
        assert!(cut <= MAX_ERROR_BODY);
        assert!(body.is_char_boundary(cut));
    }
}
