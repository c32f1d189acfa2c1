//! Scripted provider for tests and offline runs

use super::traits::{MarketDataProvider, OptionChainRecord, QuoteRecord};
use crate::error::MarketDataError;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock provider for testing
///
/// Answers from scripted quotes and chains. A configured failure takes
/// precedence over any scripted answer until it is cleared.
#[derive(Debug, Default)]
pub struct MockProvider {
    quotes: HashMap<String, QuoteRecord>,
    chains: HashMap<(String, Option<i64>), OptionChainRecord>,
    failure: Mutex<Option<MarketDataError>>,
    delay: Option<Duration>,
    quote_calls: AtomicUsize,
    chain_calls: AtomicUsize,
    chain_requests: Mutex<Vec<(String, Option<i64>)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the quote returned for `symbol`
    pub fn with_quote(mut self, symbol: impl Into<String>, quote: QuoteRecord) -> Self {
        self.quotes.insert(symbol.into(), quote);
        self
    }

    /// Script the chain returned for `symbol` at `expiration` (`None` is the default request)
    pub fn with_chain(
        mut self,
        symbol: impl Into<String>,
        expiration: Option<i64>,
        chain: OptionChainRecord,
    ) -> Self {
        self.chains.insert((symbol.into(), expiration), chain);
        self
    }

    /// Fail every call with `error`
    pub fn with_failure(self, error: MarketDataError) -> Self {
        *self.failure.lock() = Some(error);
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change or clear the injected failure at runtime
    pub fn fail_with(&self, error: Option<MarketDataError>) {
        *self.failure.lock() = error;
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn chain_calls(&self) -> usize {
        self.chain_calls.load(Ordering::SeqCst)
    }

    /// Every `(symbol, expiration)` passed to `option_chain`, in call order
    pub fn chain_requests(&self) -> Vec<(String, Option<i64>)> {
        self.chain_requests.lock().clone()
    }

    async fn simulate(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn quote(&self, symbol: &str) -> Result<QuoteRecord> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::InvalidSymbol(symbol.to_string()))
    }

    async fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<i64>,
    ) -> Result<OptionChainRecord> {
        self.chain_calls.fetch_add(1, Ordering::SeqCst);
        self.chain_requests
            .lock()
            .push((symbol.to_string(), expiration));
        self.simulate().await?;

        self.chains
            .get(&(symbol.to_string(), expiration))
            .cloned()
            .ok_or_else(|| {
                MarketDataError::DataNotAvailable(format!("no chain scripted for {}", symbol))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_quote() {
        let provider = MockProvider::new().with_quote(
            "AAPL",
            QuoteRecord {
                symbol: "AAPL".to_string(),
                price: Some(231.5),
                ..Default::default()
            },
        );

        let quote = provider.quote("AAPL").await.unwrap();
        assert_eq!(quote.price, Some(231.5));
        assert_eq!(provider.quote_calls(), 1);

        assert!(matches!(
            provider.quote("MSFT").await,
            Err(MarketDataError::InvalidSymbol(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_injection_and_recovery() {
        let provider = MockProvider::new()
            .with_chain("SPY", None, OptionChainRecord::default())
            .with_failure(MarketDataError::Connection("refused".to_string()));

        assert_eq!(
            provider.option_chain("SPY", None).await,
            Err(MarketDataError::Connection("refused".to_string()))
        );

        provider.fail_with(None);
        assert!(provider.option_chain("SPY", None).await.is_ok());
        assert_eq!(provider.chain_calls(), 2);
        assert_eq!(
            provider.chain_requests(),
            vec![("SPY".to_string(), None), ("SPY".to_string(), None)]
        );
    }
}
