use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelId {
    pub name: String,       // logical name, e.g. "yolov7-w6"
    pub onnx_path: String,  // filesystem path
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloParams {
    pub input_size: u32,        // 640 typical
    pub conf_threshold: f32,    // 0..1
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,  // e.g. 300
    pub agnostic: bool,         // suppress across classes
    pub stride: u32,            // largest model stride
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            agnostic: false,
            stride: 64,
        }
    }
}

impl YoloParams {
    /// Inference size rounded up to a multiple of the stride.
    pub fn checked_input_size(&self) -> u32 {
        check_img_size(self.input_size, self.stride)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub model: ModelId,
    pub params: YoloParams,
}

/// Output tensor of a runner, flat and row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

pub fn check_img_size(img_size: u32, stride: u32) -> u32 {
    let stride = stride.max(1);
    let size = img_size.div_ceil(stride) * stride;
    size.max(stride)
}
