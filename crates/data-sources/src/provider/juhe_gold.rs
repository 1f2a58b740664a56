//! Shanghai Gold Exchange spot provider (Juhe data feed).
//!
//! One call returns quotes for every listed variety; the adapter scans
//! the nested per-variety objects for the canonical code. The feed uses
//! the literal string `--` for "no data yet", which parses as zero here,
//! not as an error.
//!
//! Spot metal prices move intraday but the upstream allows only a couple
//! of calls per hour, so successful quotes sit in an injected 30-minute
//! cache; a cache hit is marked with a `(cached)` source on the envelope
//! while the asset data itself stays bit-identical.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use log::debug;
use num_traits::FromPrimitive;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::classify::canonical_metal_variety;
use crate::errors::DataSourceError;
use crate::models::{AssetType, DataSourceResult, UnifiedAsset};
use crate::provider::{http_client, QuoteProvider, QUOTE_TIMEOUT};

const PROVIDER_ID: &str = "JuheGold";
const BASE_URL: &str = "https://web.juhe.cn/finance/gold/shgold";

/// Spot prices refresh at most twice an hour upstream.
const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Deserialize)]
struct GoldResponse {
    error_code: i64,
    reason: Option<String>,
    result: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct VarietyQuote {
    variety: String,
    latestpri: Option<String>,
    openpri: Option<String>,
    maxpri: Option<String>,
    minpri: Option<String>,
    yespri: Option<String>,
    totalvol: Option<String>,
    time: Option<String>,
}

/// Precious-metal spot provider with an injected response cache.
pub struct JuheGoldProvider {
    client: Client,
    api_key: Option<String>,
    cache: Arc<ResponseCache<UnifiedAsset>>,
}

impl JuheGoldProvider {
    pub fn new(api_key: Option<String>, cache: Arc<ResponseCache<UnifiedAsset>>) -> Self {
        Self {
            client: http_client(QUOTE_TIMEOUT),
            api_key,
            cache,
        }
    }
}

/// `--` means "no data yet" and is zero, never a parse error.
fn parse_quote_field(raw: Option<&str>) -> f64 {
    match raw {
        None | Some("--") => 0.0,
        Some(s) => s.parse().unwrap_or(0.0),
    }
}

/// Scan the nested per-variety objects for the entry matching `variety`.
fn find_variety(result: &[Value], variety: &str) -> Option<VarietyQuote> {
    for entry in result {
        let Some(map) = entry.as_object() else {
            continue;
        };
        for candidate in map.values() {
            if candidate.get("variety").and_then(Value::as_str) == Some(variety) {
                if let Ok(quote) = serde_json::from_value(candidate.clone()) {
                    return Some(quote);
                }
            }
        }
    }
    None
}

fn display_name(variety: &str) -> String {
    match variety {
        "Au99.99" => "黄金 (Au99.99)".to_string(),
        "Ag99.99" => "白银 (Ag99.99)".to_string(),
        other => format!("贵金属 ({})", other),
    }
}

fn asset_from_quote(variety: &str, quote: VarietyQuote) -> UnifiedAsset {
    let price_raw = parse_quote_field(quote.latestpri.as_deref());
    let prev_raw = parse_quote_field(quote.yespri.as_deref());

    let price = Decimal::from_f64(price_raw);
    let change_percent = if prev_raw != 0.0 {
        let prev = Decimal::from_f64(prev_raw);
        match (price, prev) {
            (Some(p), Some(y)) => Some((p - y) / y * Decimal::ONE_HUNDRED),
            _ => None,
        }
    } else {
        Some(Decimal::ZERO)
    };

    let last_updated = quote
        .time
        .as_deref()
        .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S").ok())
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);

    UnifiedAsset {
        symbol: variety.to_string(),
        name: display_name(variety),
        price,
        change_percent,
        currency: "CNY".to_string(),
        market: Some("上海黄金交易所".to_string()),
        asset_type: AssetType::Metal,
        source: PROVIDER_ID.to_string(),
        last_updated,
        metadata: json!({
            "open": parse_quote_field(quote.openpri.as_deref()),
            "high": parse_quote_field(quote.maxpri.as_deref()),
            "low": parse_quote_field(quote.minpri.as_deref()),
            "volume": parse_quote_field(quote.totalvol.as_deref()),
            "prevClose": prev_raw,
        }),
    }
}

#[async_trait]
impl QuoteProvider for JuheGoldProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn supported_types(&self) -> &'static [AssetType] {
        &[AssetType::Metal]
    }

    /// Cache-aware envelope: a warm entry short-circuits the upstream
    /// call and is marked `(cached)` without touching the asset data.
    async fn query(&self, symbol: &str) -> DataSourceResult {
        if let Some(variety) = canonical_metal_variety(symbol) {
            if let Some(asset) = self.cache.get(variety) {
                debug!("serving {} from cache", variety);
                return DataSourceResult::hit(format!("{} (cached)", PROVIDER_ID), asset);
            }
        }
        match self.fetch(symbol).await {
            Ok(asset) => DataSourceResult::hit(PROVIDER_ID, asset),
            Err(error) => DataSourceResult::miss(PROVIDER_ID, &error),
        }
    }

    async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError> {
        let variety =
            canonical_metal_variety(symbol).ok_or_else(|| DataSourceError::Unrecognized {
                input: symbol.to_string(),
            })?;

        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DataSourceError::MissingCredential {
                provider: PROVIDER_ID.to_string(),
            })?;

        let url = format!("{}?key={}", BASE_URL, key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;
        let body: GoldResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;

        if body.error_code != 0 {
            return Err(DataSourceError::Upstream {
                provider: PROVIDER_ID.to_string(),
                message: body
                    .reason
                    .unwrap_or_else(|| format!("error_code {}", body.error_code)),
            });
        }

        let result = body.result.unwrap_or_default();
        let quote = find_variety(&result, variety).ok_or_else(|| DataSourceError::NotFound {
            provider: PROVIDER_ID.to_string(),
            message: format!("未找到 {} 的数据", variety),
        })?;

        let asset = asset_from_quote(variety, quote);
        self.cache.set(variety, asset.clone(), CACHE_TTL);
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn feed_fixture() -> Vec<Value> {
        vec![json!({
            "0": {
                "variety": "Au99.99",
                "latestpri": "550.00",
                "openpri": "548.00",
                "maxpri": "552.00",
                "minpri": "547.50",
                "yespri": "500.00",
                "totalvol": "12345.6",
                "time": "2025-08-07 10:30:00"
            },
            "1": {
                "variety": "Ag99.99",
                "latestpri": "--",
                "openpri": "--",
                "maxpri": "--",
                "minpri": "--",
                "yespri": "7.40",
                "totalvol": "--",
                "time": "2025-08-07 10:30:00"
            }
        })]
    }

    #[test]
    fn test_find_variety_scans_nested_objects() {
        let quote = find_variety(&feed_fixture(), "Ag99.99").unwrap();
        assert_eq!(quote.variety, "Ag99.99");
        assert!(find_variety(&feed_fixture(), "Pt99.95").is_none());
    }

    #[test]
    fn test_no_data_sentinel_parses_as_zero() {
        assert_eq!(parse_quote_field(Some("--")), 0.0);
        assert_eq!(parse_quote_field(None), 0.0);
        assert_eq!(parse_quote_field(Some("550.00")), 550.0);
    }

    #[test]
    fn test_change_percent_derived_from_previous_close() {
        let quote = find_variety(&feed_fixture(), "Au99.99").unwrap();
        let asset = asset_from_quote("Au99.99", quote);
        assert_eq!(asset.price, Some(dec!(550)));
        assert_eq!(asset.change_percent, Some(dec!(10)));
        assert_eq!(asset.market.as_deref(), Some("上海黄金交易所"));
        assert_eq!(asset.asset_type, AssetType::Metal);
    }

    #[test]
    fn test_sentinel_price_with_previous_close() {
        let quote = find_variety(&feed_fixture(), "Ag99.99").unwrap();
        let asset = asset_from_quote("Ag99.99", quote);
        // latest is "--": price 0, change computed against yespri
        assert_eq!(asset.price, Some(dec!(0)));
        assert_eq!(asset.change_percent, Some(dec!(-100)));
    }

    #[tokio::test]
    async fn test_warm_cache_marks_source_and_keeps_data_identical() {
        let cache = Arc::new(ResponseCache::new());
        let provider = JuheGoldProvider::new(Some("key".to_string()), cache.clone());

        let quote = find_variety(&feed_fixture(), "Au99.99").unwrap();
        let asset = asset_from_quote("Au99.99", quote);
        cache.set("Au99.99", asset.clone(), Duration::from_secs(60));

        // alias input converges on the cached canonical variety
        let result = provider.query("Au999").await;
        assert!(result.success);
        assert_eq!(result.source, "JuheGold (cached)");
        let cached = result.data.unwrap();
        assert_eq!(cached.price, asset.price);
        assert_eq!(cached.change_percent, asset.change_percent);
        assert_eq!(cached.source, asset.source);
        assert_eq!(cached.last_updated, asset.last_updated);
    }

    #[tokio::test]
    async fn test_missing_key_with_cold_cache_is_config_failure() {
        let provider = JuheGoldProvider::new(None, Arc::new(ResponseCache::new()));
        let err = provider.fetch("黄金").await.unwrap_err();
        assert!(matches!(err, DataSourceError::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn test_unknown_variety_short_circuits() {
        let provider = JuheGoldProvider::new(Some("key".to_string()), Arc::new(ResponseCache::new()));
        let err = provider.fetch("Pt950").await.unwrap_err();
        assert!(matches!(err, DataSourceError::Unrecognized { .. }));
    }
}
