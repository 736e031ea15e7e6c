pub mod routes;
pub mod state;

use axum::{routing::{get, post}, Router};
use tower_http::trace::TraceLayer;
use crate::adapters::http::state::HttpState;

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/predict", post(routes::predict))
        .route("/api/config", get(routes::get_config))
        .route("/healthz", get(routes::health))
        .route("/livez", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
