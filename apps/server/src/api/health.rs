use std::sync::Arc;

use axum::{routing::get, Router};

use crate::main_lib::AppState;

async fn healthz() -> &'static str {
    "ok"
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/health", get(healthz))
}
