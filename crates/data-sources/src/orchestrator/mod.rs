//! Resolution orchestrator.
//!
//! Walks the classifier's candidates against the adapters registered for
//! each asset category, in priority order, short-circuiting on the first
//! success. Failures never abort the cascade - a timeout counts the same
//! as any other miss and the walk advances. Only the terminal aggregated
//! failure reaches the caller; no partially-filled asset ever does.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::classify::{classify, is_six_digit_code, Candidate};
use crate::errors::FailureKind;
use crate::models::{AssetType, DataSourceResult};
use crate::provider::QuoteProvider;

const ORCHESTRATOR_SOURCE: &str = "DataSources";

/// Suggestion hint for a terminal miss, keyed off the input shape.
pub fn suggestion_for(input: &str) -> &'static str {
    if is_six_digit_code(input.trim()) {
        "请确认基金或股票代码是否正确"
    } else {
        "可尝试指定资产类型"
    }
}

/// Orchestrates quote resolution across the registered adapters.
pub struct Orchestrator {
    providers: Vec<Arc<dyn QuoteProvider>>,
}

impl Orchestrator {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        Self { providers }
    }

    /// Adapters able to handle `asset_type`, highest priority first.
    fn providers_for(&self, asset_type: AssetType) -> Vec<&Arc<dyn QuoteProvider>> {
        let mut providers: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.supported_types().contains(&asset_type))
            .collect();
        providers.sort_by_key(|p| p.priority());
        providers
    }

    /// Resolve raw user input into a single normalized quote.
    ///
    /// The classifier's candidate order is honored: for a bare six-digit
    /// code the fund candidate is exhausted before the normalized
    /// equity candidate is tried.
    pub async fn resolve(&self, input: &str, hint: Option<AssetType>) -> DataSourceResult {
        let candidates = match classify(input, hint) {
            Ok(candidates) => candidates,
            Err(error) => {
                debug!("classification failed for {:?}: {}", input, error);
                return DataSourceResult::miss(ORCHESTRATOR_SOURCE, &error);
            }
        };

        let mut rate_limited = false;
        let mut attempts = 0usize;

        for Candidate { symbol, asset_type } in &candidates {
            let providers = self.providers_for(*asset_type);
            if providers.is_empty() {
                debug!("no adapters registered for {:?}", asset_type);
                continue;
            }

            for provider in providers {
                attempts += 1;
                info!(
                    "trying {} for {} (as {:?})",
                    provider.id(),
                    symbol,
                    asset_type
                );
                let result = provider.query(symbol).await;
                if result.success {
                    info!("{} resolved {}", provider.id(), symbol);
                    return result;
                }

                if result.kind == Some(FailureKind::RateLimit) {
                    rate_limited = true;
                }
                warn!(
                    "{} missed {}: {}",
                    provider.id(),
                    symbol,
                    result.error.as_deref().unwrap_or("unknown failure")
                );
            }
        }

        let kind = if rate_limited {
            FailureKind::RateLimit
        } else {
            FailureKind::NotFound
        };
        debug!(
            "exhausted {} adapter attempts for {:?}",
            attempts, input
        );
        DataSourceResult::miss_with_message(
            ORCHESTRATOR_SOURCE,
            kind,
            format!("未找到代码 \"{}\" 对应的资产", input.trim()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DataSourceError;
    use crate::models::UnifiedAsset;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use std::sync::Mutex;

    enum Behavior {
        Succeed,
        NotFound,
        Timeout,
        RateLimited,
    }

    struct MockProvider {
        id: &'static str,
        priority: u8,
        types: &'static [AssetType],
        behavior: Behavior,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockProvider {
        fn new(
            id: &'static str,
            priority: u8,
            types: &'static [AssetType],
            behavior: Behavior,
            calls: Arc<Mutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                types,
                behavior,
                calls,
            })
        }

        fn asset(&self, symbol: &str) -> UnifiedAsset {
            UnifiedAsset {
                symbol: symbol.to_string(),
                name: symbol.to_string(),
                price: Some(dec!(100)),
                change_percent: Some(dec!(1.5)),
                currency: "USD".to_string(),
                market: None,
                asset_type: self.types[0],
                source: self.id.to_string(),
                last_updated: Utc::now(),
                metadata: Value::Null,
            }
        }
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn supported_types(&self) -> &'static [AssetType] {
            self.types
        }

        async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.id, symbol));
            match self.behavior {
                Behavior::Succeed => Ok(self.asset(symbol)),
                Behavior::NotFound => Err(DataSourceError::NotFound {
                    provider: self.id.to_string(),
                    message: format!("{} has no data for {}", self.id, symbol),
                }),
                Behavior::Timeout => Err(DataSourceError::Timeout {
                    provider: self.id.to_string(),
                }),
                Behavior::RateLimited => Err(DataSourceError::RateLimited {
                    provider: self.id.to_string(),
                }),
            }
        }
    }

    const EQUITY: &[AssetType] = &[AssetType::Stock, AssetType::Etf];
    const FUND: &[AssetType] = &[AssetType::Fund];

    #[tokio::test]
    async fn test_short_circuits_on_first_success() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(vec![
            MockProvider::new("primary", 1, EQUITY, Behavior::Succeed, calls.clone()),
            MockProvider::new("secondary", 2, EQUITY, Behavior::Succeed, calls.clone()),
        ]);

        let result = orchestrator.resolve("AAPL", None).await;
        assert!(result.success);
        assert_eq!(result.source, "primary");
        assert_eq!(calls.lock().unwrap().as_slice(), ["primary:AAPL"]);
    }

    #[tokio::test]
    async fn test_cascades_to_secondary_on_miss() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(vec![
            MockProvider::new("secondary", 2, EQUITY, Behavior::Succeed, calls.clone()),
            MockProvider::new("primary", 1, EQUITY, Behavior::NotFound, calls.clone()),
        ]);

        let result = orchestrator.resolve("AAPL", None).await;
        assert!(result.success);
        assert_eq!(result.source, "secondary");
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            ["primary:AAPL", "secondary:AAPL"]
        );
    }

    #[tokio::test]
    async fn test_six_digit_tries_fund_before_normalized_equity() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(vec![
            MockProvider::new("equity", 1, EQUITY, Behavior::Succeed, calls.clone()),
            MockProvider::new("fund", 1, FUND, Behavior::NotFound, calls.clone()),
        ]);

        let result = orchestrator.resolve("600519", None).await;
        assert!(result.success);
        assert_eq!(result.source, "equity");
        // fund candidate first with the bare code, then the suffixed equity
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            ["fund:600519", "equity:600519.SS"]
        );
    }

    #[tokio::test]
    async fn test_timeout_advances_cascade() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(vec![
            MockProvider::new("slow", 1, EQUITY, Behavior::Timeout, calls.clone()),
            MockProvider::new("fallback", 2, EQUITY, Behavior::Succeed, calls.clone()),
        ]);

        let result = orchestrator.resolve("AAPL", None).await;
        assert!(result.success);
        assert_eq!(result.source, "fallback");
    }

    #[tokio::test]
    async fn test_exhaustion_reports_not_found_with_distinct_message() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(vec![MockProvider::new(
            "only",
            1,
            EQUITY,
            Behavior::Timeout,
            calls.clone(),
        )]);

        let result = orchestrator.resolve("AAPL", None).await;
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.kind, Some(FailureKind::NotFound));
        let message = result.error.unwrap();
        assert!(message.contains("未找到代码"));
        assert!(!message.contains("无法识别"));
    }

    #[tokio::test]
    async fn test_classification_failure_is_distinct_from_exhaustion() {
        let orchestrator = Orchestrator::new(vec![]);
        let result = orchestrator.resolve("Pt950", Some(AssetType::Metal)).await;
        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::Classification));
        assert!(result.error.unwrap().contains("无法识别的代码格式"));
    }

    #[tokio::test]
    async fn test_rate_limit_carries_through_to_terminal_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Orchestrator::new(vec![
            MockProvider::new("limited", 1, EQUITY, Behavior::RateLimited, calls.clone()),
            MockProvider::new("missing", 2, EQUITY, Behavior::NotFound, calls.clone()),
        ]);

        let result = orchestrator.resolve("AAPL", None).await;
        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::RateLimit));
    }

    #[tokio::test]
    async fn test_no_registered_adapters_is_a_miss_not_a_panic() {
        let orchestrator = Orchestrator::new(vec![]);
        let result = orchestrator.resolve("600519", None).await;
        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::NotFound));
    }

    #[test]
    fn test_suggestion_keyed_off_six_digit_shape() {
        assert_eq!(suggestion_for("600519"), "请确认基金或股票代码是否正确");
        assert_eq!(suggestion_for("AAPL"), "可尝试指定资产类型");
    }
}
