//! Chengdu government real-estate registry provider.
//!
//! Signed GET against the open-data gateway: every request carries
//! `X-Client-Id`, `X-Timestamp`, `X-Nonce` and `X-Signature`, where the
//! signature is base64(HMAC-SHA256(clientId + timestamp + nonce)) keyed
//! by the client secret.
//!
//! The registry lists pre/for-sale project records with a sale AREA but
//! no per-unit price, so the asset carries no price; project counts,
//! aggregate area and a sample of records ride along in the metadata.
//! An empty result list is "not found", not an error.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;

use crate::errors::DataSourceError;
use crate::models::{AssetType, UnifiedAsset};
use crate::provider::{http_client, QuoteProvider, QUOTE_TIMEOUT};

type HmacSha256 = Hmac<Sha256>;

const PROVIDER_ID: &str = "GovRealEstate";
const BASE_URL: &str =
    "https://www.chengdu.gov.cn/data/gateway/api/1/sfgj/gjxmmccxy/xsxmxx";

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    code: i64,
    #[serde(default)]
    data: Vec<Value>,
}

/// Credentials for the signed gateway. Both parts are optional at
/// runtime; a missing pair degrades to a clean config failure.
#[derive(Clone, Debug, Default)]
pub struct RegistryCredentials {
    pub client_id: Option<String>,
    pub secret: Option<String>,
}

/// Real-estate project lookup by project name.
pub struct GovRealEstateProvider {
    client: Client,
    credentials: RegistryCredentials,
}

impl GovRealEstateProvider {
    pub fn new(credentials: RegistryCredentials) -> Self {
        Self {
            client: http_client(QUOTE_TIMEOUT),
            credentials,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), DataSourceError> {
        let client_id = self.credentials.client_id.as_deref().filter(|s| !s.is_empty());
        let secret = self.credentials.secret.as_deref().filter(|s| !s.is_empty());
        match (client_id, secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(DataSourceError::MissingCredential {
                provider: PROVIDER_ID.to_string(),
            }),
        }
    }
}

/// base64(HMAC-SHA256(clientId + timestamp + nonce)) keyed by the secret.
fn generate_signature(client_id: &str, timestamp: &str, nonce: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(client_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn random_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(13)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

fn field_str<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn total_area(records: &[Value]) -> f64 {
    records
        .iter()
        .filter_map(|r| {
            field_str(r, "AREA")
                .and_then(|a| a.parse::<f64>().ok())
                .filter(|a| *a > 0.0)
        })
        .sum()
}

fn asset_from_projects(project_name: &str, records: &[Value]) -> UnifiedAsset {
    let samples: Vec<Value> = records
        .iter()
        .take(3)
        .map(|r| {
            json!({
                "name": field_str(r, "PROJECT"),
                "area": field_str(r, "AREA"),
                "address": field_str(r, "ADDRESS"),
                "developer": field_str(r, "UNITNAME"),
                "saleDate": field_str(r, "OPENSALEDATE"),
            })
        })
        .collect();

    let mut region_codes: Vec<String> = records
        .iter()
        .filter_map(|r| field_str(r, "REGIONCODE").map(str::to_string))
        .collect();
    region_codes.sort();
    region_codes.dedup();

    UnifiedAsset {
        symbol: format!("CN-CD-{}", project_name),
        name: project_name.to_string(),
        // The registry publishes sale area but no unit pricing, so there
        // is no price to report.
        price: None,
        change_percent: None,
        currency: "CNY".to_string(),
        market: Some("中国房产市场".to_string()),
        asset_type: AssetType::RealEstate,
        source: PROVIDER_ID.to_string(),
        last_updated: Utc::now(),
        metadata: json!({
            "city": "成都",
            "projectCount": records.len(),
            "totalArea": total_area(records),
            "sampleProjects": samples,
            "regionCodes": region_codes,
        }),
    }
}

#[async_trait]
impl QuoteProvider for GovRealEstateProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn supported_types(&self) -> &'static [AssetType] {
        &[AssetType::RealEstate]
    }

    async fn fetch(&self, project_name: &str) -> Result<UnifiedAsset, DataSourceError> {
        let (client_id, secret) = self.credentials()?;

        let timestamp = Utc::now().timestamp_millis().to_string();
        let nonce = random_nonce();
        let signature = generate_signature(client_id, &timestamp, &nonce, secret);

        debug!("querying registry for project {}", project_name);

        let response = self
            .client
            .get(BASE_URL)
            .query(&[("PROJECT", project_name)])
            .header("X-Client-Id", client_id)
            .header("X-Timestamp", &timestamp)
            .header("X-Nonce", &nonce)
            .header("X-Signature", &signature)
            .send()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataSourceError::Transport {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let body: RegistryResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::from_reqwest(PROVIDER_ID, e))?;

        if body.code != 200 || body.data.is_empty() {
            return Err(DataSourceError::NotFound {
                provider: PROVIDER_ID.to_string(),
                message: format!("未找到项目\"{}\"的相关信息", project_name),
            });
        }

        Ok(asset_from_projects(project_name, &body.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_known_vector() {
        // printf 'client-a1700000000000abc123nonce' |
        //   openssl dgst -sha256 -hmac 'top-secret' -binary | base64
        let signature =
            generate_signature("client-a", "1700000000000", "abc123nonce", "top-secret");
        assert_eq!(signature, "JrclrGcHlIVP2omZD9Of7zb4RtR02dJnPnTsJfQXXjw=");
    }

    #[test]
    fn test_signature_changes_with_nonce() {
        let a = generate_signature("client-a", "1700000000000", "nonce-1", "top-secret");
        let b = generate_signature("client-a", "1700000000000", "nonce-2", "top-secret");
        assert_ne!(a, b);
    }

    #[test]
    fn test_nonce_shape() {
        let nonce = random_nonce();
        assert_eq!(nonce.len(), 13);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    fn record(area: &str, region: &str) -> Value {
        json!({
            "PROJECT": "学府家苑",
            "AREA": area,
            "ADDRESS": "成都市某区某路",
            "UNITNAME": "某开发商",
            "OPENSALEDATE": "2025-06-01",
            "REGIONCODE": region,
        })
    }

    #[test]
    fn test_asset_carries_no_price_but_aggregates_area() {
        let records = vec![record("1200.5", "510104"), record("800", "510105")];
        let asset = asset_from_projects("学府家苑", &records);
        assert_eq!(asset.price, None);
        assert_eq!(asset.change_percent, None);
        assert_eq!(asset.symbol, "CN-CD-学府家苑");
        assert_eq!(asset.asset_type, AssetType::RealEstate);
        assert_eq!(asset.metadata["projectCount"], 2);
        assert_eq!(asset.metadata["totalArea"], 2000.5);
        assert_eq!(asset.metadata["regionCodes"][0], "510104");
    }

    #[test]
    fn test_region_codes_deduplicated() {
        let records = vec![record("100", "510104"), record("200", "510104")];
        let asset = asset_from_projects("学府家苑", &records);
        assert_eq!(asset.metadata["regionCodes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_area_excluded_from_total() {
        let records = vec![record("abc", "510104"), record("300", "510105")];
        let asset = asset_from_projects("学府家苑", &records);
        assert_eq!(asset.metadata["totalArea"], 300.0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_network() {
        let provider = GovRealEstateProvider::new(RegistryCredentials::default());
        let err = provider.fetch("学府家苑").await.unwrap_err();
        assert!(matches!(err, DataSourceError::MissingCredential { .. }));

        let provider = GovRealEstateProvider::new(RegistryCredentials {
            client_id: Some("id".to_string()),
            secret: None,
        });
        let err = provider.fetch("学府家苑").await.unwrap_err();
        assert!(matches!(err, DataSourceError::MissingCredential { .. }));
    }
}
