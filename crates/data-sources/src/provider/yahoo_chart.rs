//! Yahoo Finance chart provider.
//!
//! A single chart call returns both the current price and the previous
//! close. The daily change percent is derived from those two numbers
//! instead of trusting an upstream change field - the upstream field is
//! sometimes stale relative to the price.
//!
//! The same endpoint, with a date range, serves the daily history pulls
//! used by the backfill service.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use num_traits::FromPrimitive;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use urlencoding::encode;

use crate::errors::DataSourceError;
use crate::models::{AssetType, DailyQuote, UnifiedAsset};
use crate::provider::{http_client, QuoteProvider, BULK_TIMEOUT, QUOTE_TIMEOUT};

const PROVIDER_ID: &str = "Yahoo Finance";
const BASE_URL: &str = "https://query2.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    currency: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    full_exchange_name: Option<String>,
    instrument_type: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    close: Option<Vec<Option<f64>>>,
}

/// Equity/ETF quote provider backed by the Yahoo chart endpoint.
pub struct YahooChartProvider {
    quote_client: Client,
    history_client: Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new() -> Self {
        Self {
            quote_client: http_client(QUOTE_TIMEOUT),
            history_client: http_client(BULK_TIMEOUT),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Fetch up to `days` of daily closes, oldest first.
    pub async fn daily_history(
        &self,
        symbol: &str,
        days: i64,
    ) -> Result<Vec<DailyQuote>, DataSourceError> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(days);
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&period1={}&period2={}",
            self.base_url,
            encode(symbol),
            start.timestamp(),
            end.timestamp()
        );

        let response = self
            .history_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;
        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;

        let result = chart
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| DataSourceError::NotFound {
                provider: PROVIDER_ID.to_string(),
                message: format!("No history from Yahoo for {}", symbol),
            })?;

        Ok(history_from_result(result))
    }

    fn asset_from_meta(meta: ChartMeta) -> Result<UnifiedAsset, DataSourceError> {
        let price_raw = meta
            .regular_market_price
            .ok_or_else(|| DataSourceError::NotFound {
                provider: PROVIDER_ID.to_string(),
                message: "No data from Yahoo".to_string(),
            })?;
        let price = Decimal::from_f64(price_raw).ok_or_else(|| DataSourceError::Parse {
            provider: PROVIDER_ID.to_string(),
            message: format!("unrepresentable price {}", price_raw),
        })?;

        let change_percent = derive_change_percent(price, meta.chart_previous_close);

        let asset_type = match meta.instrument_type.as_deref() {
            Some("ETF") => AssetType::Etf,
            _ => AssetType::Stock,
        };

        let name = meta
            .long_name
            .or(meta.short_name)
            .unwrap_or_else(|| meta.symbol.clone());

        Ok(UnifiedAsset {
            symbol: meta.symbol,
            name,
            price: Some(price),
            change_percent,
            currency: meta.currency.unwrap_or_else(|| "USD".to_string()),
            market: meta.full_exchange_name,
            asset_type,
            source: PROVIDER_ID.to_string(),
            last_updated: Utc::now(),
            metadata: json!({
                "previousClose": meta.chart_previous_close,
                "instrumentType": meta.instrument_type,
            }),
        })
    }
}

impl Default for YahooChartProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// `(price - previousClose) / previousClose * 100`, never the upstream
/// change field. A zero or missing previous close yields no change.
fn derive_change_percent(price: Decimal, previous_close: Option<f64>) -> Option<Decimal> {
    let prev = Decimal::from_f64(previous_close?)?;
    if prev <= Decimal::ZERO {
        return None;
    }
    Some((price - prev) / prev * Decimal::ONE_HUNDRED)
}

fn history_from_result(result: ChartResult) -> Vec<DailyQuote> {
    let timestamps = result.timestamp.unwrap_or_default();
    let closes = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .and_then(|q| q.close)
        .unwrap_or_default();

    timestamps
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = Decimal::from_f64(close?)?;
            let date = DateTime::<Utc>::from_timestamp(ts, 0)?.date_naive();
            Some(DailyQuote::new(date, close))
        })
        .collect()
}

#[async_trait]
impl QuoteProvider for YahooChartProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn supported_types(&self) -> &'static [AssetType] {
        &[AssetType::Stock, AssetType::Etf, AssetType::Index]
    }

    async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d",
            self.base_url,
            encode(symbol)
        );

        let response = self
            .quote_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;
        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;

        let meta = chart
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .map(|r| r.meta)
            .ok_or_else(|| DataSourceError::NotFound {
                provider: PROVIDER_ID.to_string(),
                message: "No data from Yahoo".to_string(),
            })?;

        Self::asset_from_meta(meta)
    }
}
