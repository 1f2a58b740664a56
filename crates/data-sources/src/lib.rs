//! Assetfolio Data Sources Crate
//!
//! Multi-source quote aggregation and normalization for the Assetfolio
//! application: user-supplied tickers of unknown type and origin are
//! resolved, through a prioritized cascade of heterogeneous upstream
//! APIs, into a single normalized asset quote.
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |   User input     | --> |   Classifier     |  (candidate symbols + type hints)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  Orchestrator    |  (priority cascade, short-circuit)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  QuoteProvider   |  (Yahoo, AKShare, KuCoin, ...)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  UnifiedAsset    |  (normalized quote)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`UnifiedAsset`] - Normalized quote record shared by every adapter
//! - [`DataSourceResult`] - Non-throwing adapter call envelope
//! - [`AssetType`] - Closed set of asset categories
//! - [`Orchestrator`] - Candidate/provider cascade walker
//! - [`ResponseCache`] - Injected TTL store for slow-moving upstream data
//! - [`HistoryService`] - Daily close backfill over tracked symbols

pub mod cache;
pub mod classify;
pub mod errors;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod provider;

// Re-export all public types from models
pub use models::{AssetType, DailyQuote, DataSourceResult, UnifiedAsset};

// Re-export classification helpers
pub use classify::{canonical_metal_variety, classify, is_six_digit_code, normalize_a_share, Candidate};

// Re-export error types
pub use errors::{DataSourceError, FailureKind};

// Re-export cache
pub use cache::ResponseCache;

// Re-export provider types
pub use provider::akshare::AkshareFundProvider;
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::crypto_exchange::{CryptoHistoryProvider, CryptoTickerProvider};
pub use provider::gov_realestate::{GovRealEstateProvider, RegistryCredentials};
pub use provider::juhe_car::{CarBrand, CarCatalogProvider, CarModel, CarSeries, CatalogList};
pub use provider::juhe_gold::JuheGoldProvider;
pub use provider::tushare::TushareFundProvider;
pub use provider::yahoo_chart::YahooChartProvider;
pub use provider::QuoteProvider;

// Re-export orchestration and history
pub use history::{BackfillJob, BackfillSummary, HistoryService};
pub use orchestrator::{suggestion_for, Orchestrator};
