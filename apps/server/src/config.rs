use std::{net::SocketAddr, time::Duration};

use assetfolio_data_sources::{AssetType, BackfillJob};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub request_timeout: Duration,

    // Provider credentials - all optional; an absent key degrades the
    // matching adapter to a clean failure envelope, never a crash.
    pub alpha_vantage_key: Option<String>,
    pub tushare_key: Option<String>,
    pub juhe_gold_key: Option<String>,
    pub juhe_car_key: Option<String>,
    pub gov_client_id: Option<String>,
    pub gov_client_secret: Option<String>,

    /// Interpreter for the scripted fund provider.
    pub python_path: String,

    /// Bearer secret guarding the batch-update endpoint and scheduler.
    pub cron_secret: Option<String>,

    /// Symbols the scheduler backfills, e.g. "AAPL:stock,BTC:crypto".
    pub tracked_symbols: Vec<BackfillJob>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("AF_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid AF_LISTEN_ADDR");
        let timeout_ms: u64 = std::env::var("AF_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .unwrap_or(30000);
        let tracked_symbols = std::env::var("AF_TRACKED_SYMBOLS")
            .map(|raw| parse_tracked(&raw))
            .unwrap_or_default();

        Self {
            listen_addr,
            request_timeout: Duration::from_millis(timeout_ms),
            alpha_vantage_key: env_opt("ALPHA_VANTAGE_KEY"),
            tushare_key: env_opt("TUSHARE_KEY"),
            juhe_gold_key: env_opt("JUHE_GOLD_KEY"),
            juhe_car_key: env_opt("JUHE_CAR_KEY"),
            gov_client_id: env_opt("GOV_CLIENT_ID"),
            gov_client_secret: env_opt("GOV_CLIENT_SECRET"),
            python_path: std::env::var("AF_PYTHON_PATH").unwrap_or_else(|_| "python3".into()),
            cron_secret: env_opt("CRON_SECRET"),
            tracked_symbols,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse "SYMBOL[:type]" entries, comma separated. Unknown or missing
/// types default to stock.
pub fn parse_tracked(raw: &str) -> Vec<BackfillJob> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let (symbol, type_label) = match entry.split_once(':') {
                Some((s, t)) => (s.trim(), t.trim()),
                None => (entry, "stock"),
            };
            if symbol.is_empty() {
                return None;
            }
            Some(BackfillJob {
                symbol: symbol.to_string(),
                asset_type: asset_type_label(type_label).unwrap_or(AssetType::Stock),
            })
        })
        .collect()
}

/// Wire labels match the serde snake_case form of [`AssetType`].
pub fn asset_type_label(label: &str) -> Option<AssetType> {
    match label {
        "stock" => Some(AssetType::Stock),
        "etf" => Some(AssetType::Etf),
        "index" => Some(AssetType::Index),
        "crypto" => Some(AssetType::Crypto),
        "fund" => Some(AssetType::Fund),
        "metal" => Some(AssetType::Metal),
        "real_estate" => Some(AssetType::RealEstate),
        "car" => Some(AssetType::Car),
        "custom" => Some(AssetType::Custom),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tracked_entries() {
        let jobs = parse_tracked("AAPL:stock, BTC:crypto ,600519, ,017174:fund");
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[0].symbol, "AAPL");
        assert_eq!(jobs[1].asset_type, AssetType::Crypto);
        assert_eq!(jobs[2].symbol, "600519");
        assert_eq!(jobs[2].asset_type, AssetType::Stock);
        assert_eq!(jobs[3].asset_type, AssetType::Fund);
    }

    #[test]
    fn test_asset_type_labels_cover_wire_names() {
        assert_eq!(asset_type_label("real_estate"), Some(AssetType::RealEstate));
        assert_eq!(asset_type_label("etf"), Some(AssetType::Etf));
        assert_eq!(asset_type_label("bogus"), None);
    }
}
