//! Tushare fund provider.
//!
//! Commercial API multiplexed through a single POST endpoint: the
//! `api_name` field selects the operation and a `token` parameter
//! authenticates. Responses carry a `code`/`msg` status pair and a
//! columnar `fields`/`items` payload that is zipped back into rows here.
//!
//! Two-step lookup: `fund_basic` for identity, then `fund_nav` over a
//! 30-day window. The NAV series is re-sorted by date before taking the
//! latest - upstream appears to answer newest-first, but that ordering is
//! an unverified external contract.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use log::{debug, warn};
use num_traits::FromPrimitive;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::errors::DataSourceError;
use crate::models::{AssetType, UnifiedAsset};
use crate::provider::{http_client, QuoteProvider, BULK_TIMEOUT};

const PROVIDER_ID: &str = "Tushare基金";
const BASE_URL: &str = "https://api.tushare.pro";

#[derive(Debug, Deserialize)]
struct TushareResponse {
    code: i64,
    msg: Option<String>,
    data: Option<TushareData>,
}

#[derive(Debug, Deserialize)]
struct TushareData {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

/// One row of a columnar payload, keyed by field name.
type Row = HashMap<String, Value>;

#[derive(Debug, PartialEq)]
struct NavRecord {
    nav_date: Option<String>,
    unit_nav: Option<f64>,
    accum_nav: Option<f64>,
    daily_return: Option<f64>,
}

/// Open-end fund provider backed by the Tushare commercial API.
pub struct TushareFundProvider {
    client: Client,
    token: Option<String>,
}

impl TushareFundProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: http_client(BULK_TIMEOUT),
            token,
        }
    }

    fn token(&self) -> Result<&str, DataSourceError> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DataSourceError::MissingCredential {
                provider: PROVIDER_ID.to_string(),
            })
    }

    async fn call(
        &self,
        api_name: &str,
        params: Value,
        fields: &str,
    ) -> Result<TushareData, DataSourceError> {
        let token = self.token()?;
        let body = json!({
            "token": token,
            "api_name": api_name,
            "params": params,
            "fields": fields,
        });

        let response = self
            .client
            .post(BASE_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;
        let envelope: TushareResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;

        if envelope.code != 0 {
            return Err(DataSourceError::Upstream {
                provider: PROVIDER_ID.to_string(),
                message: envelope
                    .msg
                    .unwrap_or_else(|| format!("{} failed with code {}", api_name, envelope.code)),
            });
        }

        envelope.data.ok_or_else(|| DataSourceError::Parse {
            provider: PROVIDER_ID.to_string(),
            message: format!("{} returned no data block", api_name),
        })
    }

    async fn fund_basic(&self, ts_code: &str) -> Result<Option<Row>, DataSourceError> {
        let data = self
            .call(
                "fund_basic",
                json!({ "ts_code": ts_code }),
                "ts_code,name,management,found_date,fund_type,market",
            )
            .await?;
        Ok(rows_from_columnar(&data).into_iter().next())
    }

    async fn latest_nav_record(&self, ts_code: &str) -> Option<NavRecord> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(30);
        let result = self
            .call(
                "fund_nav",
                json!({
                    "ts_code": ts_code,
                    "start_date": start.format("%Y-%m-%d").to_string(),
                    "end_date": end.format("%Y-%m-%d").to_string(),
                }),
                "nav_date,unit_nav,accum_nav,daily_return",
            )
            .await;

        match result {
            Ok(data) => latest_nav(rows_from_columnar(&data)),
            Err(e) => {
                warn!("fund_nav lookup failed for {}: {}", ts_code, e);
                None
            }
        }
    }
}

/// Zip a columnar `fields`/`items` payload into per-row maps.
fn rows_from_columnar(data: &TushareData) -> Vec<Row> {
    data.items
        .iter()
        .map(|item| {
            data.fields
                .iter()
                .cloned()
                .zip(item.iter().cloned())
                .collect()
        })
        .collect()
}

fn row_str(row: &Row, field: &str) -> Option<String> {
    row.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

fn row_f64(row: &Row, field: &str) -> Option<f64> {
    match row.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Latest NAV record after a defensive date-descending sort; positional
/// index 0 of the raw payload is never trusted.
fn latest_nav(mut rows: Vec<Row>) -> Option<NavRecord> {
    rows.sort_by(|a, b| {
        let da = row_str(a, "nav_date").unwrap_or_default();
        let db = row_str(b, "nav_date").unwrap_or_default();
        db.cmp(&da)
    });
    let row = rows.into_iter().next()?;
    Some(NavRecord {
        nav_date: row_str(&row, "nav_date"),
        unit_nav: row_f64(&row, "unit_nav"),
        accum_nav: row_f64(&row, "accum_nav"),
        daily_return: row_f64(&row, "daily_return"),
    })
}

/// NAV dates arrive as `20250801` or `2025-08-01` depending on endpoint.
fn nav_timestamp(nav_date: Option<&str>) -> DateTime<Utc> {
    nav_date
        .and_then(|d| {
            NaiveDate::parse_from_str(d, "%Y%m%d")
                .or_else(|_| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
                .ok()
        })
        .and_then(|d| d.and_hms_opt(15, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

#[async_trait]
impl QuoteProvider for TushareFundProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn supported_types(&self) -> &'static [AssetType] {
        &[AssetType::Fund]
    }

    async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError> {
        let raw = symbol.trim();
        let suffixed = if raw.contains('.') {
            raw.to_string()
        } else {
            format!("{}.OF", raw)
        };

        // Suffixed form first; one retry with the bare code if it 404s.
        let mut ts_code = suffixed.clone();
        let mut fund = self.fund_basic(&suffixed).await?;
        if fund.is_none() && raw != suffixed {
            debug!("no fund_basic record for {}, retrying as {}", suffixed, raw);
            fund = self.fund_basic(raw).await?;
            ts_code = raw.to_string();
        }

        let fund = fund.ok_or_else(|| DataSourceError::NotFound {
            provider: PROVIDER_ID.to_string(),
            message: format!("未找到基金代码 \"{}\"", raw),
        })?;

        let nav = self.latest_nav_record(&ts_code).await;
        let (price, change_percent, last_updated) = match &nav {
            Some(record) => (
                record
                    .unit_nav
                    .filter(|v| *v != 0.0)
                    .or(record.accum_nav)
                    .and_then(Decimal::from_f64),
                record.daily_return.and_then(Decimal::from_f64),
                nav_timestamp(record.nav_date.as_deref()),
            ),
            None => (None, None, Utc::now()),
        };

        Ok(UnifiedAsset {
            symbol: row_str(&fund, "ts_code").unwrap_or(ts_code),
            name: row_str(&fund, "name").unwrap_or_else(|| raw.to_string()),
            price,
            change_percent,
            currency: "CNY".to_string(),
            market: row_str(&fund, "market")
                .filter(|m| !m.is_empty())
                .or_else(|| Some("中国场外基金市场".to_string())),
            asset_type: AssetType::Fund,
            source: PROVIDER_ID.to_string(),
            last_updated,
            metadata: json!({
                "management": fund.get("management"),
                "fundType": fund.get("fund_type"),
                "foundDate": fund.get("found_date"),
            }),
        })
    }
}
