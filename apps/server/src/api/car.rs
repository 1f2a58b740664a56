//! Car catalog endpoints: brand, series and model chains.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::main_lib::AppState;

async fn brands(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let list = state.car_catalog.brands().await?;
    Ok(Json(json!({
        "success": true,
        "data": list.items,
        "source": list.source,
    })))
}

#[derive(Deserialize)]
struct SeriesQuery {
    #[serde(rename = "brandId")]
    brand_id: String,
}

async fn series(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Json<Value>> {
    let list = state.car_catalog.series(&query.brand_id).await?;
    Ok(Json(json!({
        "success": true,
        "data": list.items,
        "source": list.source,
    })))
}

#[derive(Deserialize)]
struct ModelsQuery {
    #[serde(rename = "seriesId")]
    series_id: String,
}

async fn models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelsQuery>,
) -> ApiResult<Json<Value>> {
    let list = state.car_catalog.models(&query.series_id).await?;
    Ok(Json(json!({
        "success": true,
        "data": list.items,
        "source": list.source,
    })))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/car/brands", get(brands))
        .route("/api/car/series", get(series))
        .route("/api/car/models", get(models))
}
