use anyhow::Result;
use async_trait::async_trait;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::fs;
use std::sync::{Arc, Mutex};

use crate::application::ports::InferenceRunnerPort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::RawOutput;

/// ONNX Runtime session run on the blocking pool, one inference at a time.
pub struct OnnxRunner {
    session: Arc<Mutex<Session>>,
}

impl OnnxRunner {
    pub fn load(path: &str, intra_threads: usize) -> Result<Self> {
        let builder = Session::builder()?.with_intra_threads(intra_threads)?;
        let model_bytes = fs::read(path)?;
        let session = builder.commit_from_memory(&model_bytes)?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
        })
    }
}

fn run_session(session: &mut Session, input: Array4<f32>) -> Result<RawOutput> {
    let input_shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
    let (data, _) = input.into_raw_vec_and_offset();
    let input_tensor = Value::from_array((input_shape, data))?;

    let outputs = session.run(ort::inputs![input_tensor])?;
    let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

    Ok(RawOutput {
        shape: shape_out.iter().map(|&x| x as usize).collect(),
        data: data_out.to_vec(),
    })
}

#[async_trait]
impl InferenceRunnerPort for OnnxRunner {
    async fn run(&self, input: Array4<f32>) -> DomainResult<RawOutput> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = session
                .lock()
                .map_err(|_| DomainError::Inference("session lock poisoned".into()))?;
            run_session(&mut session, input).map_err(|e| DomainError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| DomainError::Inference(format!("inference task: {e}")))?
    }
}
