use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rand::seq::IndexedRandom;
use tract_onnx::prelude::*;

use crate::classifier::{CLASS_NAMES, preprocess};
use crate::error::ApiError;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const MOCK_CONFIDENCE: f32 = 0.98;
const MOCK_OFF_SCORE: f32 = 0.01;
const MOCK_PROCESSING_TIME: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: &'static str,
    pub confidence: f32,
    pub scores: BTreeMap<&'static str, f32>,
    pub processing_time: f64,
}

/// The classifier is loaded once at startup and shared read-only across
/// requests. When no usable artifact exists the service stays up in mock
/// mode so the rest of the stack can be exercised without the model file.
pub enum Classifier {
    Real(OnnxPlan),
    Mock,
}

impl Classifier {
    pub fn load(model_path: &str) -> Self {
        if !Path::new(model_path).exists() {
            log::warn!("Model not found at: {}", model_path);
            log::warn!("Running in MOCK MODE");
            return Classifier::Mock;
        }
        match Self::load_onnx(model_path) {
            Ok(plan) => {
                log::info!("Model loaded from: {}", model_path);
                Classifier::Real(plan)
            }
            Err(e) => {
                log::error!("Error loading model: {}", e);
                log::warn!("Running in MOCK MODE");
                Classifier::Mock
            }
        }
    }

    fn load_onnx(model_path: &str) -> TractResult<OnnxPlan> {
        tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(
                        1,
                        preprocess::IMAGE_SIZE as usize,
                        preprocess::IMAGE_SIZE as usize,
                        3
                    ),
                ),
            )?
            .into_optimized()?
            .into_runnable()
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Classifier::Real(_) => "Real",
            Classifier::Mock => "Mock",
        }
    }

    pub fn predict(&self, image_data: &[u8]) -> Result<Prediction, ApiError> {
        // Decode before branching so mock mode still rejects broken uploads.
        let image = preprocess::decode(image_data)?;

        match self {
            Classifier::Mock => Ok(Self::mock_prediction()),
            Classifier::Real(plan) => {
                let start = Instant::now();
                let input = preprocess::to_tensor(&image)?;
                let outputs = plan
                    .run(tvec!(input.into()))
                    .map_err(|e| ApiError::Inference(e.to_string()))?;
                let view = outputs[0]
                    .to_array_view::<f32>()
                    .map_err(|e| ApiError::Inference(e.to_string()))?;

                let mut scores = BTreeMap::new();
                let mut best = 0usize;
                let mut best_score = f32::MIN;
                for (i, &score) in view.iter().take(CLASS_NAMES.len()).enumerate() {
                    scores.insert(CLASS_NAMES[i], score);
                    if score > best_score {
                        best = i;
                        best_score = score;
                    }
                }
                if scores.len() != CLASS_NAMES.len() {
                    return Err(ApiError::Inference(format!(
                        "model produced {} scores, expected {}",
                        scores.len(),
                        CLASS_NAMES.len()
                    )));
                }

                Ok(Prediction {
                    label: CLASS_NAMES[best],
                    confidence: best_score,
                    scores,
                    processing_time: start.elapsed().as_secs_f64(),
                })
            }
        }
    }

    fn mock_prediction() -> Prediction {
        let label = CLASS_NAMES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(CLASS_NAMES[0]);
        let scores = CLASS_NAMES
            .iter()
            .map(|&name| {
                (
                    name,
                    if name == label {
                        MOCK_CONFIDENCE
                    } else {
                        MOCK_OFF_SCORE
                    },
                )
            })
            .collect();

        Prediction {
            label,
            confidence: MOCK_CONFIDENCE,
            scores,
            processing_time: MOCK_PROCESSING_TIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([90, 90, 90]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn missing_artifact_loads_mock() {
        let classifier = Classifier::load("/nonexistent/brain_model.onnx");
        assert_eq!(classifier.mode(), "Mock");
    }

    #[test]
    fn unreadable_artifact_loads_mock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not an onnx graph").unwrap();
        let classifier = Classifier::load(path.to_str().unwrap());
        assert_eq!(classifier.mode(), "Mock");
    }

    #[test]
    fn mock_prediction_uses_fixed_confidences() {
        let prediction = Classifier::Mock.predict(&png_bytes()).unwrap();
        assert!(CLASS_NAMES.contains(&prediction.label));
        assert_eq!(prediction.confidence, MOCK_CONFIDENCE);
        assert_eq!(prediction.processing_time, MOCK_PROCESSING_TIME);
        assert_eq!(prediction.scores.len(), CLASS_NAMES.len());
        for (name, score) in &prediction.scores {
            if *name == prediction.label {
                assert_eq!(*score, MOCK_CONFIDENCE);
            } else {
                assert_eq!(*score, MOCK_OFF_SCORE);
            }
        }
    }

    #[test]
    fn mock_prediction_still_validates_the_image() {
        let err = Classifier::Mock.predict(b"garbage").unwrap_err();
        assert!(matches!(err, ApiError::ImageDecode(_)));
    }
}
