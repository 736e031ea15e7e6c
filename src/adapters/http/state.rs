use std::sync::Arc;
use crate::application::services::PredictService;

/// Shared state for the Axum handlers.
#[derive(Clone)]
pub struct HttpState {
    pub predict: Arc<PredictService>,
}
