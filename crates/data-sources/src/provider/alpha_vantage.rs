//! Alpha Vantage equity provider.
//!
//! Two sequential calls: SYMBOL_SEARCH for a localized name and currency,
//! then GLOBAL_QUOTE for the price. A search miss only downgrades the
//! name/currency to defaults - the quote call still runs with the raw
//! symbol. The free tier's rate-limit `Note` is kept distinguishable from
//! a plain miss.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::errors::DataSourceError;
use crate::models::{AssetType, UnifiedAsset};
use crate::provider::{http_client, QuoteProvider, QUOTE_TIMEOUT};

const PROVIDER_ID: &str = "Alpha Vantage";
const BASE_URL: &str = "https://www.alphavantage.co/query";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "bestMatches")]
    best_matches: Option<Vec<SearchMatch>>,
}

#[derive(Debug, Deserialize)]
struct SearchMatch {
    #[serde(rename = "2. name")]
    name: String,
    #[serde(rename = "8. currency")]
    currency: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// Equity quote provider requiring an API key. Without one it fails
/// immediately, before any network I/O.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: Option<String>,
}

impl AlphaVantageProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http_client(QUOTE_TIMEOUT),
            api_key,
        }
    }

    fn key(&self) -> Result<&str, DataSourceError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DataSourceError::MissingCredential {
                provider: PROVIDER_ID.to_string(),
            })
    }

    /// Best-effort search step. Misses and transport failures both fall
    /// back to `(symbol, "USD")` - only the quote step decides success.
    async fn search_name_currency(&self, symbol: &str, key: &str) -> (String, String) {
        let url = format!(
            "{}?function=SYMBOL_SEARCH&keywords={}&apikey={}",
            BASE_URL, symbol, key
        );
        let matched = match self.client.get(&url).send().await {
            Ok(response) => response.json::<SearchResponse>().await.ok(),
            Err(e) => {
                debug!("search step failed for {}: {}", symbol, e);
                None
            }
        };

        matched
            .and_then(|s| s.best_matches)
            .and_then(|mut m| if m.is_empty() { None } else { Some(m.remove(0)) })
            .map(|m| (m.name, m.currency))
            .unwrap_or_else(|| (symbol.to_string(), "USD".to_string()))
    }
}

/// Parse an upstream `"1.2345%"` change-percent string.
fn parse_percent(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim().trim_end_matches('%')).ok()
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn supported_types(&self) -> &'static [AssetType] {
        &[AssetType::Stock, AssetType::Etf, AssetType::Index]
    }

    async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError> {
        let key = self.key()?.to_string();

        let (name, currency) = self.search_name_currency(symbol, &key).await;

        let url = format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            BASE_URL, symbol, key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;
        let quote_data: QuoteResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;

        if quote_data.note.is_some() {
            return Err(DataSourceError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        let quote = quote_data
            .global_quote
            .ok_or_else(|| DataSourceError::NotFound {
                provider: PROVIDER_ID.to_string(),
                message: "No quote data".to_string(),
            })?;

        let price = quote
            .price
            .as_deref()
            .and_then(|p| Decimal::from_str(p).ok())
            .ok_or_else(|| DataSourceError::Parse {
                provider: PROVIDER_ID.to_string(),
                message: "quote missing price field".to_string(),
            })?;
        let change_percent = quote.change_percent.as_deref().and_then(parse_percent);

        Ok(UnifiedAsset {
            symbol: quote.symbol.unwrap_or_else(|| symbol.to_string()),
            name,
            price: Some(price),
            change_percent,
            currency,
            market: Some("US".to_string()),
            asset_type: AssetType::Stock,
            source: PROVIDER_ID.to_string(),
            last_updated: Utc::now(),
            metadata: Value::Null,
        })
    }
}
