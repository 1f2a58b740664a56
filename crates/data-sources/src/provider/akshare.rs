//! AKShare fund NAV provider.
//!
//! Quotes open-end funds by spawning a Python subprocess running an
//! embedded AKShare script. The subprocess writes diagnostics to stderr
//! and may emit progress lines on stdout; only the trailing JSON line is
//! data. The subprocess lifecycle (spawn, capture, timeout-kill) stays
//! inside this adapter - nothing of it leaks into the orchestrator
//! contract.
//!
//! The full-market snapshot sometimes reports a unit NAV of exactly zero
//! for a fund that does have history (new listings, suspended pricing).
//! In that case a second subprocess pulls the historical series and the
//! most recent strictly-positive NAV wins, along with its daily change
//! when one is present.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::DataSourceError;
use crate::models::{AssetType, UnifiedAsset};
use crate::provider::{QuoteProvider, BULK_TIMEOUT};

const PROVIDER_ID: &str = "AKShare";

/// Snapshot lookup against the full open-fund daily table.
/// Takes the fund code as its sole argument and prints one JSON object.
const SNAPSHOT_SCRIPT: &str = r#"
import json, sys
import akshare as ak
import pandas as pd

code = sys.argv[1]

def safe_float(value, default=0.0):
    if value is None:
        return default
    try:
        if pd.isna(value):
            return default
    except TypeError:
        pass
    if isinstance(value, str):
        value = value.strip()
        if value in ('', '%'):
            return default
    try:
        return float(value)
    except (ValueError, TypeError):
        return default

try:
    df = ak.fund_open_fund_daily_em()
    row = df[df['基金代码'] == code]
    if row.empty:
        print(json.dumps({"success": False, "error": f"未找到基金代码 {code}"}, ensure_ascii=False))
        sys.exit(0)
    fund = row.iloc[0]
    nav_cols = sorted([c for c in df.columns if c.endswith('-单位净值')], reverse=True)
    nav_col = nav_cols[0]
    print(f"using snapshot column {nav_col}", file=sys.stderr)
    name = fund.get('基金简称', code)
    if pd.isna(name):
        name = code
    payload = {
        "success": True,
        "name": str(name),
        "nav": safe_float(fund.get(nav_col, 0)),
        "nav_date": nav_col.replace('-单位净值', ''),
        "daily_change": safe_float(fund.get('日增长率', 0)),
        "akshare_version": ak.__version__,
    }
    print(json.dumps(payload, ensure_ascii=False, default=str))
except Exception as e:
    print(json.dumps({"success": False, "error": str(e)}, ensure_ascii=False))
"#;

/// Historical NAV series lookup. The keyword argument name varies across
/// AKShare versions, so several are attempted.
const HISTORY_SCRIPT: &str = r#"
import json, sys
import akshare as ak
import pandas as pd

code = sys.argv[1]

def safe_float(value, default=0.0):
    if value is None:
        return default
    try:
        if pd.isna(value):
            return default
    except TypeError:
        pass
    try:
        return float(value)
    except (ValueError, TypeError):
        return default

try:
    hist = None
    for param in ('symbol', 'fund', 'code', 'fund_code'):
        try:
            hist = ak.fund_open_fund_hist_em(**{param: code})
            if hist is not None and not hist.empty:
                print(f"history endpoint accepted param {param}", file=sys.stderr)
                break
        except Exception:
            continue
    rows = []
    if hist is not None:
        for _, row in hist.iterrows():
            rows.append({
                "date": str(row.get('净值日期', '')),
                "nav": safe_float(row.get('单位净值', 0)),
                "change": safe_float(row.get('日增长率', 0)),
            })
    print(json.dumps({"success": True, "rows": rows}, ensure_ascii=False, default=str))
except Exception as e:
    print(json.dumps({"success": False, "error": str(e)}, ensure_ascii=False))
"#;

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    success: bool,
    error: Option<String>,
    name: Option<String>,
    nav: Option<f64>,
    nav_date: Option<String>,
    daily_change: Option<f64>,
    akshare_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryPayload {
    success: bool,
    #[serde(default)]
    rows: Vec<HistoryRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct HistoryRow {
    date: String,
    nav: f64,
    #[serde(default)]
    change: f64,
}

/// Open-end fund provider backed by a scripted external process.
pub struct AkshareFundProvider {
    python_path: String,
}

impl AkshareFundProvider {
    pub fn new(python_path: impl Into<String>) -> Self {
        Self {
            python_path: python_path.into(),
        }
    }

    async fn run_script(&self, script: &str, code: &str) -> Result<String, DataSourceError> {
        let mut command = Command::new(&self.python_path);
        command
            .arg("-c")
            .arg(script)
            .arg(code)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(BULK_TIMEOUT, command.output())
            .await
            .map_err(|_| DataSourceError::Timeout {
                provider: PROVIDER_ID.to_string(),
            })?
            .map_err(|e| DataSourceError::Transport {
                provider: PROVIDER_ID.to_string(),
                message: format!("failed to spawn {}: {}", self.python_path, e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            if line.trim().is_empty()
                || line.contains("WARNING:")
                || line.contains("DeprecationWarning")
            {
                continue;
            }
            debug!(target: "akshare", "{}", line);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            warn!(target: "akshare", "script produced no stdout for {}", code);
            return Err(DataSourceError::Upstream {
                provider: PROVIDER_ID.to_string(),
                message: format!("script produced no output (status {})", output.status),
            });
        }
        Ok(stdout)
    }

    async fn history_fallback(&self, code: &str) -> Option<HistoryRow> {
        let stdout = match self.run_script(HISTORY_SCRIPT, code).await {
            Ok(out) => out,
            Err(e) => {
                warn!(target: "akshare", "history fallback failed for {}: {}", code, e);
                return None;
            }
        };
        let payload: HistoryPayload = parse_trailing_json(&stdout).ok()?;
        if !payload.success {
            return None;
        }
        latest_positive_nav(payload.rows)
    }
}

/// Strip the exchange/fund suffix a caller may have attached.
fn clean_fund_code(symbol: &str) -> &str {
    symbol
        .trim()
        .trim_end_matches(".OF")
        .trim_end_matches(".SS")
        .trim_end_matches(".SZ")
}

/// Parse the last non-empty stdout line as JSON. Everything before it is
/// subprocess chatter and must be discarded, not parsed as data.
fn parse_trailing_json<T: serde::de::DeserializeOwned>(stdout: &str) -> Result<T, DataSourceError> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| DataSourceError::Parse {
            provider: PROVIDER_ID.to_string(),
            message: "empty subprocess output".to_string(),
        })?;
    serde_json::from_str(line.trim()).map_err(|e| DataSourceError::Parse {
        provider: PROVIDER_ID.to_string(),
        message: format!("bad subprocess payload: {}", e),
    })
}

/// Most recent strictly-positive NAV in the series. The series is sorted
/// by date descending here rather than trusting upstream order.
fn latest_positive_nav(mut rows: Vec<HistoryRow>) -> Option<HistoryRow> {
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows.into_iter().find(|row| row.nav > 0.0)
}

/// Funds report NAV as of a trading day; stamp it at the 15:00 UTC close
/// marker the rest of the app uses for CNY funds.
fn nav_timestamp(nav_date: Option<&str>) -> DateTime<Utc> {
    nav_date
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(15, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

#[async_trait]
impl QuoteProvider for AkshareFundProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn supported_types(&self) -> &'static [AssetType] {
        &[AssetType::Fund]
    }

    async fn fetch(&self, symbol: &str) -> Result<UnifiedAsset, DataSourceError> {
        let code = clean_fund_code(symbol);
        let stdout = self.run_script(SNAPSHOT_SCRIPT, code).await?;
        let snapshot: SnapshotPayload = parse_trailing_json(&stdout)?;

        if !snapshot.success {
            return Err(DataSourceError::NotFound {
                provider: PROVIDER_ID.to_string(),
                message: snapshot
                    .error
                    .unwrap_or_else(|| format!("未找到基金代码 {}", code)),
            });
        }

        let mut nav = snapshot.nav.unwrap_or(0.0);
        let mut nav_date = snapshot.nav_date.clone();
        let mut daily_change = snapshot.daily_change.unwrap_or(0.0);

        if nav == 0.0 {
            debug!(target: "akshare", "snapshot NAV is zero for {}, trying history", code);
            if let Some(row) = self.history_fallback(code).await {
                nav = row.nav;
                nav_date = Some(row.date);
                if row.change != 0.0 {
                    daily_change = row.change;
                }
            }
        }

        let name = snapshot.name.unwrap_or_else(|| code.to_string());
        let version = snapshot.akshare_version;

        Ok(UnifiedAsset {
            symbol: format!("{}.OF", code),
            name,
            price: Decimal::from_f64(nav),
            change_percent: Decimal::from_f64(daily_change),
            currency: "CNY".to_string(),
            market: Some("中国场外基金市场".to_string()),
            asset_type: AssetType::Fund,
            source: PROVIDER_ID.to_string(),
            last_updated: nav_timestamp(nav_date.as_deref()),
            metadata: json!({
                "navDate": nav_date,
                "akshareVersion": version,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_fund_code_strips_suffixes() {
        assert_eq!(clean_fund_code("017174.OF"), "017174");
        assert_eq!(clean_fund_code("600519.SS"), "600519");
        assert_eq!(clean_fund_code("000001.SZ"), "000001");
        assert_eq!(clean_fund_code("017174"), "017174");
    }

    #[test]
    fn test_trailing_json_line_wins_over_diagnostics() {
        let stdout = "fetching snapshot...\nprogress 50%\n{\"success\": true, \"name\": \"测试基金\", \"nav\": 1.23, \"nav_date\": \"2025-08-01\", \"daily_change\": 0.5}\n";
        let payload: SnapshotPayload = parse_trailing_json(stdout).unwrap();
        assert!(payload.success);
        assert_eq!(payload.name.as_deref(), Some("测试基金"));
        assert_eq!(payload.nav, Some(1.23));
    }

    #[test]
    fn test_non_json_trailing_line_is_parse_error() {
        let err = parse_trailing_json::<SnapshotPayload>("progress line only\n").unwrap_err();
        assert!(matches!(err, DataSourceError::Parse { .. }));
    }

    #[test]
    fn test_empty_output_is_parse_error() {
        let err = parse_trailing_json::<SnapshotPayload>("\n\n").unwrap_err();
        assert!(matches!(err, DataSourceError::Parse { .. }));
    }

    #[test]
    fn test_latest_positive_nav_sorts_descending_first() {
        let rows = vec![
            HistoryRow { date: "2025-07-30".into(), nav: 0.0, change: 0.0 },
            HistoryRow { date: "2025-08-01".into(), nav: 1.08, change: 0.4 },
            HistoryRow { date: "2025-07-31".into(), nav: 1.05, change: -0.2 },
        ];
        // ascending input: the most recent positive entry must still win
        let row = latest_positive_nav(rows).unwrap();
        assert_eq!(row.date, "2025-08-01");
        assert_eq!(row.nav, 1.08);
    }

    #[test]
    fn test_latest_positive_nav_skips_zero_entries() {
        let rows = vec![
            HistoryRow { date: "2025-08-01".into(), nav: 0.0, change: 0.0 },
            HistoryRow { date: "2025-07-31".into(), nav: 1.05, change: 0.3 },
        ];
        let row = latest_positive_nav(rows).unwrap();
        assert_eq!(row.date, "2025-07-31");
    }

    #[test]
    fn test_latest_positive_nav_empty_series() {
        assert!(latest_positive_nav(vec![]).is_none());
        let rows = vec![HistoryRow { date: "2025-08-01".into(), nav: 0.0, change: 0.0 }];
        assert!(latest_positive_nav(rows).is_none());
    }

    #[test]
    fn test_nav_timestamp_uses_close_marker() {
        let ts = nav_timestamp(Some("2025-08-01"));
        assert_eq!(ts.to_rfc3339(), "2025-08-01T15:00:00+00:00");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_transport_failure() {
        let provider = AkshareFundProvider::new("/nonexistent/python3");
        let err = provider.fetch("017174").await.unwrap_err();
        assert!(matches!(err, DataSourceError::Transport { .. }));
    }

    /// Full adapter pass with a stub interpreter: the snapshot reports a
    /// NAV of exactly zero, so the history series must supply the price.
    #[tokio::test]
    #[cfg(unix)]
    async fn test_zero_snapshot_nav_falls_back_to_history() {
        use rust_decimal_macros::dec;
        use std::os::unix::fs::PermissionsExt;

        let stub = std::env::temp_dir().join("akshare-stub-interpreter.sh");
        // Invoked as `stub -c <script> <code>`; dispatch on the script text.
        std::fs::write(
            &stub,
            concat!(
                "#!/bin/sh\n",
                "echo 'diagnostic chatter' >&2\n",
                "case \"$2\" in\n",
                "*fund_open_fund_daily_em*)\n",
                "  echo 'progress line'\n",
                "  echo '{\"success\": true, \"name\": \"新发基金\", \"nav\": 0.0, ",
                "\"nav_date\": \"2025-08-05\", \"daily_change\": 0.0}'\n",
                "  ;;\n",
                "*)\n",
                "  echo '{\"success\": true, \"rows\": [",
                "{\"date\": \"2025-08-03\", \"nav\": 0.0, \"change\": 0.0}, ",
                "{\"date\": \"2025-08-04\", \"nav\": 1.02, \"change\": 0.6}]}'\n",
                "  ;;\n",
                "esac\n"
            ),
        )
        .unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let provider = AkshareFundProvider::new(stub.to_string_lossy().into_owned());
        let asset = provider.fetch("017174").await.unwrap();

        assert_eq!(asset.symbol, "017174.OF");
        assert_eq!(asset.price, Some(dec!(1.02)));
        assert_eq!(asset.change_percent, Some(dec!(0.6)));
        assert_eq!(asset.last_updated.to_rfc3339(), "2025-08-04T15:00:00+00:00");
        assert_eq!(asset.asset_type, AssetType::Fund);
        assert_eq!(asset.currency, "CNY");
    }
}
