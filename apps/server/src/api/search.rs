//! Asset search endpoint: the HTTP face of the resolution orchestrator.
//!
//! - 200 with the flattened asset on a hit
//! - 400 when the symbol parameter is missing or blank
//! - 404 with a suggestion hint when every provider missed
//! - 429 with a `RATE_LIMIT` code when the cascade died rate-limited

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use assetfolio_data_sources::{suggestion_for, DataSourceResult, FailureKind};

use crate::config::asset_type_label;
use crate::main_lib::AppState;

#[derive(Deserialize)]
struct SearchQuery {
    symbol: Option<String>,
    #[serde(rename = "type")]
    asset_type: Option<String>,
}

/// Flatten the envelope into the wire shape clients consume: the asset
/// fields at the top level plus `success` and the envelope's source
/// (which carries the `(cached)` marker for cache hits).
fn hit_body(result: &DataSourceResult) -> Value {
    let mut body = result
        .data
        .as_ref()
        .and_then(|asset| serde_json::to_value(asset).ok())
        .unwrap_or_else(|| json!({}));
    if let Some(map) = body.as_object_mut() {
        map.insert("success".to_string(), json!(true));
        map.insert("source".to_string(), json!(result.source));
    }
    body
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let symbol = query
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let Some(symbol) = symbol else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "缺少代码参数" })),
        )
            .into_response();
    };

    // Unknown type labels fall back to hint-less classification, the
    // same as older clients that never sent a type.
    let hint = query.asset_type.as_deref().and_then(asset_type_label);

    let result = state.orchestrator.resolve(symbol, hint).await;
    if result.success {
        return Json(hit_body(&result)).into_response();
    }

    let error = result
        .error
        .unwrap_or_else(|| format!("未找到代码 \"{}\" 对应的资产", symbol));

    match result.kind {
        Some(FailureKind::RateLimit) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": error, "code": "RATE_LIMIT" })),
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": error,
                "suggestion": suggestion_for(symbol),
            })),
        )
            .into_response(),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/search", get(search))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetfolio_data_sources::{AssetType, UnifiedAsset};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hit_body_flattens_asset_and_overrides_source() {
        let asset = UnifiedAsset {
            symbol: "Au99.99".to_string(),
            name: "黄金 (Au99.99)".to_string(),
            price: Some(dec!(550)),
            change_percent: Some(dec!(10)),
            currency: "CNY".to_string(),
            market: Some("上海黄金交易所".to_string()),
            asset_type: AssetType::Metal,
            source: "JuheGold".to_string(),
            last_updated: Utc::now(),
            metadata: Value::Null,
        };
        let result = DataSourceResult::hit("JuheGold (cached)", asset);
        let body = hit_body(&result);
        assert_eq!(body["success"], true);
        assert_eq!(body["symbol"], "Au99.99");
        assert_eq!(body["type"], "metal");
        // envelope source (with the cached marker) wins over the asset's
        assert_eq!(body["source"], "JuheGold (cached)");
    }
}
