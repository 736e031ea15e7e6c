use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::adapters::http::state::HttpState;
use crate::application::dto::{ConfigResponse, OkResponse, PredictRequest};
use crate::domain::errors::DomainError;

fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn predict(State(st): State<HttpState>, Json(req): Json<PredictRequest>) -> impl IntoResponse {
    match st.predict.predict(req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => {
            error!("predict failed: {}", e);
            (status_for(&e), Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

pub async fn get_config(State(st): State<HttpState>) -> impl IntoResponse {
    Json(ConfigResponse::from(st.predict.inference_config()))
}

pub async fn health() -> impl IntoResponse {
    Json(OkResponse { ok: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::router;
    use crate::application::services::tests::{png_bytes, predict_service, MemoryStore};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use std::path::Path;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn app(store: Arc<MemoryStore>, root: &Path) -> axum::Router {
        router(HttpState {
            predict: Arc::new(predict_service(store, root)),
        })
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn predict_returns_location() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        store.insert("in-bucket", "dog.png", png_bytes(tmp.path()));

        let resp = app(store, tmp.path())
            .oneshot(post_json("/predict", json!({ "filename": "dog.png" })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["location"], "https://out-bucket.s3.amazonaws.com/dog.png");
    }

    #[tokio::test]
    async fn missing_object_surfaces_as_server_error() {
        let tmp = tempfile::tempdir().unwrap();
        let resp = app(Arc::new(MemoryStore::default()), tmp.path())
            .oneshot(post_json("/predict", json!({ "filename": "ghost.png" })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("image error"));
    }

    #[tokio::test]
    async fn traversal_filename_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let resp = app(Arc::new(MemoryStore::default()), tmp.path())
            .oneshot(post_json("/predict", json!({ "filename": "../secret.png" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_filename_field_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let resp = app(Arc::new(MemoryStore::default()), tmp.path())
            .oneshot(post_json("/predict", json!({ "name": "x.png" })))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn health_and_config_endpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(Arc::new(MemoryStore::default()), tmp.path());

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_json(health).await["ok"], true);

        let config = app
            .oneshot(Request::builder().uri("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(config).await;
        assert_eq!(body["imgsz"], 64);
        assert_eq!(body["max_det"], 300);
        assert_eq!(body["model_name"], "test");
    }

    #[tokio::test]
    async fn get_on_predict_is_not_allowed() {
        let tmp = tempfile::tempdir().unwrap();
        let resp = app(Arc::new(MemoryStore::default()), tmp.path())
            .oneshot(Request::builder().uri("/predict").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
