use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::put,
};

use reqflow_requisitions::RosterEntry;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", put(replace_roster))
}

/// Replace the card roster used to resolve collection scans.
pub async fn replace_roster(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<Vec<dto::RosterRowRequest>>, JsonRejection>,
) -> axum::response::Response {
    let Json(rows) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let result = services
        .run(move |s| Ok(s.roster().replace(rows.into_iter().map(RosterEntry::from))))
        .await;

    match result {
        Ok(entries) => (StatusCode::OK, Json(serde_json::json!({ "entries": entries }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
