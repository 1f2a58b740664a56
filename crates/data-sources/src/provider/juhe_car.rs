//! Juhe car catalog provider.
//!
//! Three dependent lookups: brand list, series by brand, model by
//! series. Catalog data changes rarely, so each tier has its own
//! injected cache - brands for 7 days, series and models for a day.
//! The upstream signals failure through an `error_code` sentinel and
//! sometimes answers a non-array `result`, which is treated as empty.

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::errors::DataSourceError;
use crate::provider::{http_client, QUOTE_TIMEOUT};

const PROVIDER_ID: &str = "JuheCar";
const BASE_URL: &str = "http://apis.juhe.cn/cxdq";

const BRANDS_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const SERIES_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const MODELS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    error_code: i64,
    reason: Option<String>,
    result: Option<Value>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CarBrand {
    pub id: String,
    pub name: String,
    pub logo_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CarSeries {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CarModel {
    pub id: String,
    pub name: String,
}

/// A catalog page plus the source label, suffixed `(cached)` when the
/// page came out of a warm cache.
#[derive(Clone, Debug, Serialize)]
pub struct CatalogList<T> {
    pub items: Vec<T>,
    pub source: String,
}

/// Car catalog client with per-tier response caches.
pub struct CarCatalogProvider {
    client: Client,
    api_key: Option<String>,
    brands_cache: Arc<ResponseCache<Vec<CarBrand>>>,
    series_cache: Arc<ResponseCache<Vec<CarSeries>>>,
    models_cache: Arc<ResponseCache<Vec<CarModel>>>,
}

impl CarCatalogProvider {
    pub fn new(
        api_key: Option<String>,
        brands_cache: Arc<ResponseCache<Vec<CarBrand>>>,
        series_cache: Arc<ResponseCache<Vec<CarSeries>>>,
        models_cache: Arc<ResponseCache<Vec<CarModel>>>,
    ) -> Self {
        Self {
            client: http_client(QUOTE_TIMEOUT),
            api_key,
            brands_cache,
            series_cache,
            models_cache,
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

    async fn call(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Value>, DataSourceError> {
        let key = self.key()?;
        let url = format!("{}/{}", BASE_URL, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;
        let body: CatalogResponse = response
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

        Ok(result_array(body.result))
    }

    pub async fn brands(&self) -> Result<CatalogList<CarBrand>, DataSourceError> {
        if let Some(items) = self.brands_cache.get("brands") {
            debug!("serving brand list from cache");
            return Ok(cached_list(items));
        }

        let result = self.call("brand", &[]).await?;
        let brands: Vec<CarBrand> = result
            .iter()
            .filter_map(|item| {
                Some(CarBrand {
                    id: id_string(item.get("id")?),
                    name: item.get("brand_name")?.as_str()?.to_string(),
                    logo_url: item
                        .get("brand_logo")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            })
            .collect();

        self.brands_cache.set("brands", brands.clone(), BRANDS_TTL);
        Ok(live_list(brands))
    }

    pub async fn series(&self, brand_id: &str) -> Result<CatalogList<CarSeries>, DataSourceError> {
        if let Some(items) = self.series_cache.get(brand_id) {
            debug!("serving series list from cache for brand {}", brand_id);
            return Ok(cached_list(items));
        }

        let result = self.call("series", &[("brand_id", brand_id)]).await?;
        let series: Vec<CarSeries> = result
            .iter()
            .filter_map(|item| {
                Some(CarSeries {
                    id: id_string(item.get("id")?),
                    name: item.get("series_name")?.as_str()?.to_string(),
                })
            })
            .collect();

        self.series_cache.set(brand_id, series.clone(), SERIES_TTL);
        Ok(live_list(series))
    }

    pub async fn models(&self, series_id: &str) -> Result<CatalogList<CarModel>, DataSourceError> {
        if let Some(items) = self.models_cache.get(series_id) {
            debug!("serving model list from cache for series {}", series_id);
            return Ok(cached_list(items));
        }

        let result = self.call("model", &[("series_id", series_id)]).await?;
        let models: Vec<CarModel> = result
            .iter()
            .filter_map(|item| {
                Some(CarModel {
                    id: id_string(item.get("id")?),
                    name: item.get("name")?.as_str()?.to_string(),
                })
            })
            .collect();

        self.models_cache.set(series_id, models.clone(), MODELS_TTL);
        Ok(live_list(models))
    }
}

/// A non-array `result` is treated as an empty catalog, not an error.
fn result_array(result: Option<Value>) -> Vec<Value> {
    match result {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn live_list<T>(items: Vec<T>) -> CatalogList<T> {
    CatalogList {
        items,
        source: PROVIDER_ID.to_string(),
    }
}

fn cached_list<T>(items: Vec<T>) -> CatalogList<T> {
    CatalogList {
        items,
        source: format!("{} (cached)", PROVIDER_ID),
    }
}
