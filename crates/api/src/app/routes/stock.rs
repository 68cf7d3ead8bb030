use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock))
        .route("/snapshot", put(load_snapshot))
        .route("/reorder", get(reorder_list))
}

/// Replace the whole ledger with a fresh stock count.
pub async fn load_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Vec<dto::SnapshotRowRequest>>, JsonRejection>,
) -> axum::response::Response {
    let Json(rows) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let rows = match dto::snapshot_rows(rows) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .run(move |s| s.requisitions().load_stock_snapshot(rows))
        .await
    {
        Ok(parts) => (StatusCode::OK, Json(serde_json::json!({ "parts": parts }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_stock(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.run(|s| s.requisitions().stock()).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn reorder_list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.run(|s| s.requisitions().reorder_list()).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
