//! Upstream market-data providers
//!
//! - [`traits`] - the `MarketDataProvider` seam and its record types
//! - [`yahoo`] - HTTP implementation against the Yahoo Finance v7 API
//! - [`mock`] - scripted provider for tests

pub mod mock;
pub mod traits;
pub mod yahoo;

pub use mock::MockProvider;
pub use traits::{ContractRecord, MarketDataProvider, OptionChainRecord, QuoteRecord};
pub use yahoo::{YahooConfig, YahooProvider};
