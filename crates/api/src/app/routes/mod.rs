use axum::{Router, routing::get};

pub mod orders;
pub mod roster;
pub mod stock;
pub mod system;

/// Router for all business endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/orders", orders::router())
        .nest("/stock", stock::router())
        .nest("/roster", roster::router())
}
