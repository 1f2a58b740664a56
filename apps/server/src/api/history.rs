//! Daily history endpoints: single-symbol series reads and the
//! cron-guarded batch backfill.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use assetfolio_data_sources::BackfillJob;

use crate::config::asset_type_label;
use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

const DEFAULT_DAYS: i64 = 365;

#[derive(Deserialize)]
struct HistoryQuery {
    symbol: String,
    #[serde(rename = "type")]
    asset_type: String,
    days: Option<i64>,
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let asset_type = asset_type_label(&query.asset_type)
        .ok_or_else(|| ApiError::BadRequest(format!("不支持的资产类型: {}", query.asset_type)))?;
    let days = query.days.unwrap_or(DEFAULT_DAYS);

    let series = state
        .history_service
        .daily_series(&query.symbol, asset_type, days)
        .await?;

    Ok(Json(json!({
        "success": true,
        "symbol": query.symbol,
        "history": series,
    })))
}

#[derive(Deserialize)]
struct UpdateRequest {
    #[serde(default)]
    symbols: Vec<UpdateSymbol>,
}

#[derive(Deserialize)]
struct UpdateSymbol {
    symbol: String,
    #[serde(rename = "type")]
    asset_type: String,
}

fn authorize(headers: &HeaderMap, secret: &Option<String>) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        return Err(ApiError::Unauthorized(
            "batch update disabled: no cron secret configured".to_string(),
        ));
    };
    let expected = format!("Bearer {}", secret);
    let supplied = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if supplied == expected {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Unauthorized".to_string()))
    }
}

/// Backfill the supplied symbols, or the configured tracked set when the
/// body names none. Individual failures are summarized, never fatal.
async fn update_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<UpdateRequest>>,
) -> ApiResult<Json<Value>> {
    authorize(&headers, &state.cron_secret)?;

    let request = body.map(|Json(r)| r).unwrap_or(UpdateRequest {
        symbols: Vec::new(),
    });
    let jobs: Vec<BackfillJob> = if request.symbols.is_empty() {
        state.tracked_symbols.clone()
    } else {
        request
            .symbols
            .into_iter()
            .filter_map(|entry| {
                asset_type_label(&entry.asset_type).map(|asset_type| BackfillJob {
                    symbol: entry.symbol,
                    asset_type,
                })
            })
            .collect()
    };

    let summary = state.history_service.backfill(&jobs, DEFAULT_DAYS).await;

    Ok(Json(json!({
        "message": "更新完成",
        "total": summary.total,
        "success": summary.success,
        "failed": summary.failed,
    })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/history", get(get_history))
        .route("/api/history/update", post(update_history))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_requires_configured_secret() {
        let headers = HeaderMap::new();
        assert!(authorize(&headers, &None).is_err());
    }

    #[test]
    fn test_authorize_matches_bearer_token() {
        let secret = Some("s3cret".to_string());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer s3cret".parse().unwrap());
        assert!(authorize(&headers, &secret).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer wrong".parse().unwrap());
        assert!(authorize(&headers, &secret).is_err());

        assert!(authorize(&HeaderMap::new(), &secret).is_err());
    }
}
