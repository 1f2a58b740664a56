use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{DataSourceError, FailureKind};

/// Asset classification - the closed set every resolved quote falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    #[default]
    Stock,
    Etf,
    Index,
    Crypto,
    Fund,
    Metal,
    RealEstate,
    Car,
    Custom,
}

/// The canonical normalized quote record returned by every adapter on success.
///
/// Constructed fresh per successful provider call and never mutated in
/// place - callers replace the whole record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedAsset {
    /// Provider-confirmed canonical symbol. May differ from the user input,
    /// e.g. `600519.SS`, `017174.OF`, `BTC/USDC`.
    pub symbol: String,

    /// Display name, localized when the upstream supplies one.
    pub name: String,

    /// Current price in `currency`; None when the provider cannot supply one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Signed daily percentage change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<Decimal>,

    /// Currency code (CNY, USD, USDT, ...).
    pub currency: String,

    /// Free-text venue/exchange label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,

    /// Asset category.
    #[serde(rename = "type")]
    pub asset_type: AssetType,

    /// Which adapter produced the record. Cached hits are suffixed
    /// "(cached)" so they can be told apart from live hits.
    pub source: String,

    /// Effective time of the quote - funds report NAV as of a prior
    /// trading day, so this is not necessarily "now".
    pub last_updated: DateTime<Utc>,

    /// Provider-specific extras (raw fields, OHLC snippets, counts).
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub metadata: Value,
}

/// Adapter call envelope.
///
/// Every adapter returns this shape regardless of internal failure mode;
/// callers never receive an error type from `QuoteProvider::query`. The
/// constructors enforce the invariant that `success` implies `data` and a
/// failure carries none.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceResult {
    pub success: bool,

    pub data: Option<UnifiedAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure classification for callers that need to distinguish
    /// rate limiting from a plain miss. Not serialized.
    #[serde(skip)]
    pub kind: Option<FailureKind>,

    pub source: String,
}

impl DataSourceResult {
    /// A successful resolution carrying a populated asset.
    pub fn hit(source: impl Into<String>, data: UnifiedAsset) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            source: source.into(),
        }
    }

    /// A failed resolution. The asset slot is always empty.
    pub fn miss(source: impl Into<String>, error: &DataSourceError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            source: source.into(),
        }
    }

    /// A failed resolution with a pre-rendered message.
    pub fn miss_with_message(
        source: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            kind: Some(kind),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_asset() -> UnifiedAsset {
        UnifiedAsset {
            symbol: "600519.SS".to_string(),
            name: "贵州茅台".to_string(),
            price: Some(dec!(1500.00)),
            change_percent: Some(dec!(-0.42)),
            currency: "CNY".to_string(),
            market: Some("Shanghai".to_string()),
            asset_type: AssetType::Stock,
            source: "Yahoo Finance".to_string(),
            last_updated: Utc::now(),
            metadata: Value::Null,
        }
    }

    #[test]
    fn test_hit_carries_data() {
        let result = DataSourceResult::hit("Yahoo Finance", sample_asset());
        assert!(result.success);
        assert!(result.data.is_some());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_miss_carries_no_data() {
        let err = DataSourceError::NotFound {
            provider: "Yahoo Finance".to_string(),
            message: "No data from Yahoo".to_string(),
        };
        let result = DataSourceResult::miss("Yahoo Finance", &err);
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.kind, Some(FailureKind::NotFound));
        assert!(result.error.unwrap().contains("No data from Yahoo"));
    }

    #[test]
    fn test_asset_type_wire_format() {
        let json = serde_json::to_string(&AssetType::RealEstate).unwrap();
        assert_eq!(json, "\"real_estate\"");
        let json = serde_json::to_string(&AssetType::Etf).unwrap();
        assert_eq!(json, "\"etf\"");
    }

    #[test]
    fn test_asset_serializes_type_field() {
        let asset = sample_asset();
        let value = serde_json::to_value(&asset).unwrap();
        assert_eq!(value["type"], "stock");
        assert_eq!(value["changePercent"], serde_json::json!(-0.42));
        // null metadata is omitted entirely
        assert!(value.get("metadata").is_none());
    }
}
