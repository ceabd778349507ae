//! Emotion classifier via ONNX Runtime.
//!
//! Runs a small image-classification model (YOLO11n-cls export) on a
//! single 64×64 face tensor and returns raw per-class logits.

use crate::preprocess::{Tensor, INPUT_SIZE};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0} (place the emotion classifier in the model directory)")]
    ModelNotFound(String),
    #[error("model has no {0} tensor")]
    MissingTensor(&'static str),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Maps a face tensor to per-class logits.
pub trait Classifier {
    /// Consumes the tensor; each crop is classified exactly once.
    fn run(&mut self, input: Tensor) -> Result<Vec<f32>, ClassifierError>;
}

/// ONNX emotion classifier.
pub struct OnnxClassifier {
    session: Session,
    /// Input and output names are read from the model so minor export
    /// differences ("images" vs "input", "output0" vs "logits") still load.
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Load the classifier ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or(ClassifierError::MissingTensor("input"))?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or(ClassifierError::MissingTensor("output"))?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            input_size = INPUT_SIZE,
            "loaded emotion classifier"
        );

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn run(&mut self, input: Tensor) -> Result<Vec<f32>, ClassifierError> {
        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(input.view())?
        ])?;

        let (_, logits) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("logits extraction: {e}")))?;

        if logits.is_empty() {
            return Err(ClassifierError::InferenceFailed("model produced no logits".into()));
        }

        Ok(logits.to_vec())
    }
}
