//! Crypto exchange providers.
//!
//! Two separate backends by design:
//! - [`CryptoTickerProvider`]: live ticker from KuCoin spot with a
//!   CoinGecko backstop. The user supplies a base currency ("BTC"); the
//!   default `BASE-USDT` pair cascades through alternate quote
//!   currencies when the exchange does not list it, and the asset
//!   reports the concrete market that actually matched.
//! - [`CryptoHistoryProvider`]: daily OHLCV candles from OKX, used by
//!   the backfill service.
//!
//! Quotes are deliberately never cached - always live.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, warn};
use num_traits::FromPrimitive;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::classify::CRYPTO_QUOTE_CASCADE;
use crate::errors::DataSourceError;
use crate::models::{AssetType, DailyQuote, UnifiedAsset};
use crate::provider::{http_client, QuoteProvider, BULK_TIMEOUT, QUOTE_TIMEOUT};

const TICKER_ID: &str = "Crypto-Exchange (kucoin)";
const GECKO_ID: &str = "CoinGecko";
const HISTORY_ID: &str = "Crypto-Exchange (okx)";

const KUCOIN_URL: &str = "https://api.kucoin.com";
const COINGECKO_URL: &str = "https://api.coingecko.com";
const OKX_URL: &str = "https://www.okx.com";

lazy_static! {
    /// CoinGecko coin-id map for common bases; anything missing falls
    /// back to the lowercased base symbol.
    static ref COINGECKO_IDS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("BTC", "bitcoin");
        m.insert("ETH", "ethereum");
        m.insert("BNB", "binancecoin");
        m.insert("SOL", "solana");
        m.insert("XRP", "ripple");
        m.insert("ADA", "cardano");
        m.insert("DOGE", "dogecoin");
        m.insert("DOT", "polkadot");
        m.insert("MATIC", "polygon");
        m.insert("SHIB", "shiba-inu");
        m.insert("AVAX", "avalanche-2");
        m.insert("UNI", "uniswap");
        m.insert("LINK", "chainlink");
        m.insert("ATOM", "cosmos");
        m.insert("ETC", "ethereum-classic");
        m.insert("XLM", "stellar");
        m.insert("BCH", "bitcoin-cash");
        m.insert("ALGO", "algorand");
        m.insert("VET", "vechain");
        m.insert("FIL", "filecoin");
        m.insert("TRX", "tron");
        m.insert("FTM", "fantom");
        m.insert("NEAR", "near");
        m.insert("ICP", "internet-computer");
        m.insert("APT", "aptos");
        m.insert("LDO", "lido-dao");
        m.insert("QNT", "quant-network");
        m.insert("SAND", "the-sandbox");
        m.insert("MANA", "decentraland");
        m.insert("AXS", "axie-infinity");
        m.insert("EGLD", "elrond");
        m.insert("THETA", "theta-token");
        m.insert("STX", "stacks");
        m.insert("EOS", "eos");
        m.insert("AAVE", "aave");
        m.insert("CAKE", "pancakeswap-token");
        m
    };
}

// ============================================================================
// KuCoin payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct KucoinEnvelope<T> {
    code: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KucoinSymbol {
    symbol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KucoinStats {
    last: Option<String>,
    change_rate: Option<String>,
    high: Option<String>,
    low: Option<String>,
    vol: Option<String>,
}

// ============================================================================
// Ticker provider
// ============================================================================

/// Live crypto ticker with quote-pair cascade and CoinGecko backstop.
pub struct CryptoTickerProvider {
    client: Client,
}

impl CryptoTickerProvider {
    pub fn new() -> Self {
        Self {
            client: http_client(QUOTE_TIMEOUT),
        }
    }

    /// The listed markets for this base, walking the default quote then
    /// the alternates in cascade order.
    async fn matched_market(&self, base: &str) -> Result<Option<String>, DataSourceError> {
        let url = format!("{}/api/v1/symbols", KUCOIN_URL);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(TICKER_ID, e))?;
        let envelope: KucoinEnvelope<Vec<KucoinSymbol>> = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(TICKER_ID, e))?;

        let listed: Vec<String> = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.symbol)
            .collect();

        Ok(select_market(base, &listed))
    }

    async fn exchange_ticker(&self, base: &str) -> Result<UnifiedAsset, DataSourceError> {
        let market = self
            .matched_market(base)
            .await?
            .ok_or_else(|| DataSourceError::NotFound {
                provider: TICKER_ID.to_string(),
                message: format!("未找到加密货币: {}", base),
            })?;

        let url = format!("{}/api/v1/market/stats?symbol={}", KUCOIN_URL, market);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(TICKER_ID, e))?;
        let envelope: KucoinEnvelope<KucoinStats> = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(TICKER_ID, e))?;

        if envelope.code != "200000" {
            return Err(DataSourceError::Upstream {
                provider: TICKER_ID.to_string(),
                message: format!("stats call answered code {}", envelope.code),
            });
        }

        let stats = envelope.data.ok_or_else(|| DataSourceError::Parse {
            provider: TICKER_ID.to_string(),
            message: "stats payload missing data".to_string(),
        })?;

        let price = stats
            .last
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(Decimal::from_f64)
            .ok_or_else(|| DataSourceError::Parse {
                provider: TICKER_ID.to_string(),
                message: format!("no last price for {}", market),
            })?;

        // changeRate is a fraction (0.0123 = +1.23%)
        let change_percent = stats
            .change_rate
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(|rate| Decimal::from_f64(rate * 100.0));

        let quote = market.split('-').nth(1).unwrap_or("USDT").to_string();

        Ok(UnifiedAsset {
            symbol: market.replace('-', "/"),
            name: base.to_string(),
            price: Some(price),
            change_percent,
            currency: quote,
            market: Some("Crypto".to_string()),
            asset_type: AssetType::Crypto,
            source: TICKER_ID.to_string(),
            last_updated: Utc::now(),
            metadata: json!({
                "high": stats.high,
                "low": stats.low,
                "volume": stats.vol,
            }),
        })
    }

    async fn coingecko(&self, base: &str) -> Result<UnifiedAsset, DataSourceError> {
        let coin_id = COINGECKO_IDS
            .get(base)
            .map(|id| id.to_string())
            .unwrap_or_else(|| base.to_lowercase());
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
            COINGECKO_URL, coin_id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(GECKO_ID, e))?;
        let body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(GECKO_ID, e))?;

        let prices = body.get(&coin_id).ok_or_else(|| DataSourceError::NotFound {
            provider: GECKO_ID.to_string(),
            message: format!("未找到加密货币: {}", base),
        })?;
        let price = prices
            .get("usd")
            .copied()
            .and_then(Decimal::from_f64)
            .ok_or_else(|| DataSourceError::Parse {
                provider: GECKO_ID.to_string(),
                message: format!("no usd price for {}", coin_id),
            })?;
        let change_percent = prices
            .get("usd_24h_change")
            .copied()
            .and_then(Decimal::from_f64);

        Ok(UnifiedAsset {
            symbol: format!("{}/USDT", base),
            name: base.to_string(),
            price: Some(price),
            change_percent,
            currency: "USD".to_string(),
            market: Some("Crypto".to_string()),
            asset_type: AssetType::Crypto,
            source: GECKO_ID.to_string(),
            last_updated: Utc::now(),
            metadata: Value::Null,
        })
    }
}

impl Default for CryptoTickerProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the first listed market for `base`: the USDT default first, then
/// the alternate quote currencies in cascade order.
fn select_market(base: &str, listed: &[String]) -> Option<String> {
    let default = format!("{}-USDT", base);
    if listed.iter().any(|s| s == &default) {
        return Some(default);
    }
    CRYPTO_QUOTE_CASCADE
        .iter()
        .skip(1)
        .map(|quote| format!("{}-{}", base, quote))
        .find(|candidate| listed.iter().any(|s| s == candidate))
}

#[async_trait]
impl QuoteProvider for CryptoTickerProvider {
    fn id(&self) -> &'static str {
        TICKER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn supported_types(&self) -> &'static [AssetType] {
        &[AssetType::Crypto]
    }

    async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError> {
        let base = symbol.trim().to_uppercase();

        match self.exchange_ticker(&base).await {
            Ok(asset) => return Ok(asset),
            Err(e) => {
                debug!("exchange ticker miss for {}: {}, trying CoinGecko", base, e);
            }
        }

        match self.coingecko(&base).await {
            Ok(asset) => Ok(asset),
            Err(e) => {
                warn!("all crypto sources missed for {}: {}", base, e);
                Err(DataSourceError::NotFound {
                    provider: TICKER_ID.to_string(),
                    message: format!("未找到加密货币: {}", base),
                })
            }
        }
    }
}

// ============================================================================
// History provider
// ============================================================================

#[derive(Debug, Deserialize)]
struct OkxEnvelope {
    code: String,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// Daily candle provider backed by OKX - a different exchange backend
/// than the ticker on purpose; the two feeds fail independently.
pub struct CryptoHistoryProvider {
    client: Client,
}

impl CryptoHistoryProvider {
    pub fn new() -> Self {
        Self {
            client: http_client(BULK_TIMEOUT),
        }
    }

    /// Fetch up to `days` daily closes for `BASE-USDT`, oldest first.
    pub async fn daily_series(
        &self,
        base: &str,
        days: i64,
    ) -> Result<Vec<DailyQuote>, DataSourceError> {
        let base = base.trim().to_uppercase();
        let inst_id = format!("{}-USDT", base);
        let limit = days.clamp(1, 300);
        let url = format!(
            "{}/api/v5/market/candles?instId={}&bar=1D&limit={}",
            OKX_URL, inst_id, limit
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(HISTORY_ID, e))?;
        let envelope: OkxEnvelope = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(HISTORY_ID, e))?;

        if envelope.code != "0" {
            return Err(DataSourceError::Upstream {
                provider: HISTORY_ID.to_string(),
                message: format!("candles call answered code {}", envelope.code),
            });
        }
        if envelope.data.is_empty() {
            return Err(DataSourceError::NotFound {
                provider: HISTORY_ID.to_string(),
                message: format!("未找到加密货币: {}", base),
            });
        }

        Ok(parse_candles(envelope.data))
    }
}

impl Default for CryptoHistoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Map raw candle rows to a date-ascending daily series, dropping rows
/// with the wrong arity or non-numeric open/close.
fn parse_candles(rows: Vec<Vec<Value>>) -> Vec<DailyQuote> {
    let mut series: Vec<DailyQuote> = rows
        .into_iter()
        .filter_map(|row| {
            if row.len() < 5 {
                return None;
            }
            let ts_ms: i64 = candle_number(&row[0])? as i64;
            // open must be numeric too or the row is structurally bad
            candle_number(&row[1])?;
            let close = Decimal::from_f64(candle_number(&row[4])?)?;
            let date = DateTime::<Utc>::from_timestamp(ts_ms / 1000, 0)?.date_naive();
            Some(DailyQuote::new(date, close))
        })
        .collect();
    series.sort_by_key(|q| q.date);
    series
}

fn candle_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn listed(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_pair_preferred() {
        let markets = listed(&["BTC-USDT", "BTC-USDC", "BTC-ETH"]);
        assert_eq!(select_market("BTC", &markets), Some("BTC-USDT".to_string()));
    }

    #[test]
    fn test_cascade_to_usdc_when_usdt_unlisted() {
        let markets = listed(&["BTC-USDC", "BTC-ETH"]);
        assert_eq!(select_market("BTC", &markets), Some("BTC-USDC".to_string()));
    }

    #[test]
    fn test_cascade_order_btc_before_eth() {
        let markets = listed(&["FOO-ETH", "FOO-BTC"]);
        assert_eq!(select_market("FOO", &markets), Some("FOO-BTC".to_string()));
    }

    #[test]
    fn test_unlisted_base_matches_nothing() {
        let markets = listed(&["BTC-USDT"]);
        assert_eq!(select_market("NOPE", &markets), None);
    }

    #[test]
    fn test_parse_candles_filters_bad_rows_and_sorts_ascending() {
        let rows = vec![
            // newest first, as the exchange answers
            vec![
                json!("1700172800000"),
                json!("191.0"),
                json!("195.0"),
                json!("189.0"),
                json!("193.5"),
                json!("1000"),
            ],
            // wrong arity
            vec![json!("1700086400000"), json!("190.0")],
            // non-numeric close
            vec![
                json!("1700086400000"),
                json!("190.0"),
                json!("191.0"),
                json!("189.0"),
                json!("n/a"),
                json!("1000"),
            ],
            vec![
                json!("1700000000000"),
                json!("188.0"),
                json!("190.5"),
                json!("187.0"),
                json!("190.1"),
                json!("900"),
            ],
        ];
        let series = parse_candles(rows);
        assert_eq!(series.len(), 2);
        assert!(series[0].date < series[1].date);
        assert_eq!(series[0].close, dec!(190.1));
        assert_eq!(series[1].close, dec!(193.5));
    }

    #[test]
    fn test_parse_candles_empty() {
        assert!(parse_candles(vec![]).is_empty());
    }

    #[test]
    fn test_coingecko_id_mapping() {
        assert_eq!(COINGECKO_IDS.get("BTC"), Some(&"bitcoin"));
        assert_eq!(COINGECKO_IDS.get("AVAX"), Some(&"avalanche-2"));
        assert!(COINGECKO_IDS.get("UNKNOWN").is_none());
    }
}
