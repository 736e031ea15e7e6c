use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::application::imaging::{letterbox, to_tensor, Annotator};
use crate::application::ports::InferenceRunnerPort;
use crate::domain::{
    errors::{DomainError, DomainResult},
    model::InferenceConfig,
    postprocess::postprocess,
    run_dir::create_run_dir,
    summary::summarize_detections,
};

/// Where annotated images are written.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub root: PathBuf,
    pub name: String,
}

/// Runs the detector over one image and writes the annotated copy.
pub struct DetectionService {
    runner: Arc<dyn InferenceRunnerPort>,
    infer: InferenceConfig,
    labels: Arc<Vec<String>>,
    annotator: Arc<Annotator>,
    runs: RunLayout,
}

impl DetectionService {
    pub fn new(
        runner: Arc<dyn InferenceRunnerPort>,
        infer: InferenceConfig,
        labels: Vec<String>,
        annotator: Annotator,
        runs: RunLayout,
    ) -> Self {
        let checked = infer.params.checked_input_size();
        if checked != infer.params.input_size {
            warn!(
                "input size {} is not a multiple of stride {}, using {}",
                infer.params.input_size, infer.params.stride, checked
            );
        }
        Self {
            runner,
            infer,
            labels: Arc::new(labels),
            annotator: Arc::new(annotator),
            runs,
        }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.infer
    }

    /// Returns the path of the annotated image.
    pub async fn infer_and_annotate(&self, image_path: &Path) -> DomainResult<PathBuf> {
        let t0 = Instant::now();
        let imgsz = self.infer.params.checked_input_size();

        let file_name = image_path
            .file_name()
            .ok_or_else(|| DomainError::InvalidInput(format!("no file name in {}", image_path.display())))?
            .to_owned();
        let save_dir = create_run_dir(&self.runs.root, &self.runs.name).await?;
        let save_path = save_dir.join(file_name);

        let src = image_path.to_path_buf();
        let (original, tensor) = tokio::task::spawn_blocking(move || -> DomainResult<_> {
            let original = image::open(&src)?.to_rgb8();
            let tensor = to_tensor(&letterbox(&original, imgsz));
            Ok((original, tensor))
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("preprocess task: {e}")))??;

        let t1 = Instant::now();
        let output = self.runner.run(tensor).await?;
        let t2 = Instant::now();
        let dets = postprocess(
            &output,
            &self.infer.params,
            &self.labels,
            (imgsz, imgsz),
            original.dimensions(),
        )?;
        let t3 = Instant::now();

        let summary = summarize_detections(&dets);
        info!(
            model = %self.infer.model.name,
            "{}{}Done. ({:.1}ms) Inference, ({:.1}ms) NMS",
            summary,
            if summary.is_empty() { "" } else { ", " },
            (t2 - t1).as_secs_f64() * 1e3,
            (t3 - t2).as_secs_f64() * 1e3,
        );

        let annotator = self.annotator.clone();
        let out = save_path.clone();
        tokio::task::spawn_blocking(move || -> DomainResult<()> {
            let mut canvas = original;
            annotator.draw(&mut canvas, &dets);
            canvas.save(&out)?;
            Ok(())
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("annotate task: {e}")))??;

        info!(
            "annotated image saved to {} ({:.3}s)",
            save_path.display(),
            t0.elapsed().as_secs_f64()
        );
        Ok(save_path)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::imaging::bundled_font;
    use crate::domain::model::{ModelId, RawOutput, YoloParams};
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use ndarray::Array4;
    use std::sync::Mutex;

    /// Returns a fixed row-major `[1, N, 5 + nc]` output and records input shapes.
    pub(crate) struct FakeRunner {
        pub rows: Vec<[f32; 7]>,
        pub seen: Mutex<Vec<Vec<usize>>>,
    }

    impl FakeRunner {
        pub(crate) fn new(rows: Vec<[f32; 7]>) -> Self {
            Self {
                rows,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InferenceRunnerPort for FakeRunner {
        async fn run(&self, input: Array4<f32>) -> DomainResult<RawOutput> {
            self.seen.lock().unwrap().push(input.shape().to_vec());
            Ok(RawOutput {
                shape: vec![1, self.rows.len(), 7],
                data: self.rows.iter().flatten().copied().collect(),
            })
        }
    }

    pub(crate) fn service(runner: Arc<FakeRunner>, runs_root: &Path) -> DetectionService {
        let labels = vec!["person".to_string(), "dog".to_string()];
        DetectionService::new(
            runner,
            InferenceConfig {
                model: ModelId {
                    name: "test".into(),
                    onnx_path: "unused.onnx".into(),
                },
                params: YoloParams {
                    input_size: 64,
                    stride: 32,
                    ..YoloParams::default()
                },
            },
            labels,
            Annotator::new(bundled_font().unwrap(), 10.0, 1, 2),
            RunLayout {
                root: runs_root.to_path_buf(),
                name: "exp".into(),
            },
        )
    }

    pub(crate) fn write_image(path: &Path) {
        RgbImage::from_pixel(128, 64, Rgb([0, 0, 0])).save(path).unwrap();
    }

    #[tokio::test]
    async fn annotates_into_fresh_run_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("street.png");
        write_image(&src);

        // one confident person in model space, one weak dog
        let runner = Arc::new(FakeRunner::new(vec![
            [32.0, 32.0, 16.0, 16.0, 0.9, 0.95, 0.05],
            [10.0, 10.0, 4.0, 4.0, 0.1, 0.1, 0.9],
        ]));
        let svc = service(runner.clone(), &tmp.path().join("runs"));

        let first = svc.infer_and_annotate(&src).await.unwrap();
        let second = svc.infer_and_annotate(&src).await.unwrap();

        assert_eq!(first, tmp.path().join("runs/exp/street.png"));
        assert_eq!(second, tmp.path().join("runs/exp2/street.png"));
        assert!(first.exists() && second.exists());
        assert_eq!(runner.seen.lock().unwrap()[0], vec![1, 3, 64, 64]);

        // 128x64 -> 64x32 with 16px top pad, so the box maps to x 48..80, y 16..48
        // and its caption fits in the 16 rows above it
        let out = image::open(&first).unwrap().to_rgb8();
        assert_eq!(out.dimensions(), (128, 64));
        assert_ne!(*out.get_pixel(48, 16), Rgb([0, 0, 0]));
        assert_ne!(*out.get_pixel(49, 15), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(64, 40), Rgb([0, 0, 0]));
    }

    #[tokio::test]
    async fn missing_image_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new(vec![]));
        let svc = service(runner.clone(), tmp.path());

        let err = svc
            .infer_and_annotate(&tmp.path().join("absent.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Image(_)));
        assert!(runner.seen.lock().unwrap().is_empty());
    }
}
