//! Market data retrieval and options analytics for TradeDesk
//!
//! This crate fetches quotes and option chains from an upstream provider,
//! enriches every contract with greeks and ranking scores, and keeps serving
//! structurally valid data when the upstream is degraded.
//!
//! # Core Components
//!
//! - [`black_scholes`] - Closed-form greeks and probability in the money
//! - [`normalizer`] - Per-contract enrichment (premium per day, risk tier, composite score)
//! - [`highlights`] - OTM put and call shortlists
//! - [`synthetic`] - Deterministic stand-in data seeded by the ticker
//! - [`cache`] - TTL caches for fundamentals and option chains
//! - [`circuit_breaker`] - Upstream availability gate
//! - [`provider`] - Upstream provider seam (Yahoo Finance, mock)
//! - [`retriever`] - Cache, gate, upstream and fallback orchestration
//!
//! # Key Invariants
//!
//! - Degenerate pricing inputs give null greeks, never an error
//! - Every result carries its provenance (`real` or `synthetic`)
//! - Synthetic data for a ticker is identical across calls and processes
//! - A higher risk score means a lower risk tier

pub mod black_scholes;
pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod highlights;
pub mod normalizer;
pub mod provider;
pub mod retriever;
pub mod synthetic;
pub mod types;

pub use cache::{CacheConfig, TtlCache};
pub use circuit_breaker::{GateConfig, GateStatus, UpstreamGate};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::MarketDataError;
pub use normalizer::OptionNormalizer;
pub use provider::{MarketDataProvider, MockProvider, YahooProvider};
pub use retriever::{FallbackPolicy, MarketDataRetriever, RetrieverConfig};
pub use synthetic::SyntheticGenerator;
pub use types::{
    BSInputs, FundamentalsSnapshot, Greeks, HighlightedTrades, NormalizedOption,
    OptionChainResult, OptionType, Provenance, RawOptionContract, RiskTier,
};

pub type Result<T> = std::result::Result<T, MarketDataError>;
