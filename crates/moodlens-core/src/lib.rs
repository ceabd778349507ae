//! moodlens-core — per-frame emotion classification pipeline.
//!
//! Locates faces with a cascade detector, classifies the largest ones with
//! an ONNX model and draws the results onto the frame.

pub mod classifier;
pub mod interpreter;
pub mod locator;
pub mod overlay;
pub mod pipeline;
pub mod preprocess;
pub mod selector;
pub mod types;

pub use classifier::{Classifier, ClassifierError, OnnxClassifier};
pub use interpreter::{interpret, softmax, InterpretError};
pub use locator::{CascadeLocator, FaceLocator, LocatorError, LocatorParams};
pub use overlay::{Overlay, OverlayError};
pub use pipeline::{FramePipeline, PipelineError};
pub use preprocess::{crop_normalize, PreprocessError, Tensor};
pub use selector::{select_faces, DEFAULT_MAX_FACES};
pub use types::{ClassLabels, DetectionResult, FaceDetection, LabelsError, Rectangle};

use std::path::PathBuf;

/// Default model directory: `$XDG_DATA_HOME/moodlens/models`, falling back
/// to `~/.local/share/moodlens/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("moodlens/models")
}
