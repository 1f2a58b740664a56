//! Upstream data-source adapters.
//!
//! This module contains:
//! - The `QuoteProvider` trait every quote-producing adapter implements
//! - Concrete adapters, one per upstream API
//!
//! Adapters are stateless per call; the only persistent state is the
//! injected [`ResponseCache`](crate::cache::ResponseCache) where an
//! adapter defines a cache policy. Each adapter builds its own
//! `reqwest::Client` with the time budget its upstream gets, so a slow
//! provider can never hold a resolution past its bound.

mod traits;

pub mod akshare;
pub mod alpha_vantage;
pub mod crypto_exchange;
pub mod gov_realestate;
pub mod juhe_car;
pub mod juhe_gold;
pub mod tushare;
pub mod yahoo_chart;

pub use traits::QuoteProvider;

use std::time::Duration;

/// Time budget for interactive quote/search lookups.
pub(crate) const QUOTE_TIMEOUT: Duration = Duration::from_millis(2500);

/// Time budget for bulk pulls (historical series, subprocess runs).
pub(crate) const BULK_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a client with the given request timeout.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
