use serde::{Deserialize, Serialize};

use crate::domain::model::InferenceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub model_name: String,
    pub imgsz: u32,
    pub conf_thres: f32,
    pub iou_thres: f32,
    pub max_det: usize,
    pub agnostic: bool,
}

impl From<&InferenceConfig> for ConfigResponse {
    fn from(c: &InferenceConfig) -> Self {
        Self {
            model_name: c.model.name.clone(),
            imgsz: c.params.checked_input_size(),
            conf_thres: c.params.conf_threshold,
            iou_thres: c.params.iou_threshold,
            max_det: c.params.max_detections,
            agnostic: c.params.agnostic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}
