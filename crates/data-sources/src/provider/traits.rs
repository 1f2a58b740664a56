//! Quote provider trait definition.

use async_trait::async_trait;

use crate::errors::DataSourceError;
use crate::models::{AssetType, DataSourceResult, UnifiedAsset};

/// Trait for quote-producing data sources.
///
/// Implement [`fetch`](Self::fetch) with the provider-specific request,
/// parse and mapping logic; the provided [`query`](Self::query) wraps it
/// into the non-throwing [`DataSourceResult`] envelope the orchestrator
/// consumes. Callers of `query` can never receive an error type from an
/// adapter - every failure mode is absorbed into the envelope.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Identifier stamped into `UnifiedAsset.source` and failure envelopes.
    fn id(&self) -> &'static str;

    /// Ordering within a cascade for the same asset type.
    /// Lower values are tried first. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Asset categories this adapter can resolve.
    fn supported_types(&self) -> &'static [AssetType];

    /// Fetch and normalize a quote for `symbol`.
    ///
    /// The symbol arrives already rewritten by the classifier into the
    /// form this provider expects.
    async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError>;

    /// Non-throwing adapter contract: internally time-boxed, every
    /// failure mapped to a failure envelope.
    async fn query(&self, symbol: &str) -> DataSourceResult {
        match self.fetch(symbol).await {
            Ok(asset) => DataSourceResult::hit(self.id(), asset),
            Err(error) => DataSourceResult::miss(self.id(), &error),
        }
    }
}
