//! Background loading of the pipeline's collaborators.
//!
//! Loading is split in two: [`Loader::load`] runs on a loader thread and
//! does the slow file and model work, then [`Resources::assemble`] finishes
//! on the engine thread. The cascade detector is not `Send`, so it is only
//! ever built in `assemble`.

use crate::config::EngineConfig;
use moodlens_core::{
    CascadeLocator, ClassLabels, ClassifierError, FramePipeline, LabelsError, LocatorError,
    LocatorParams, OnnxClassifier, Overlay, OverlayError,
};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("labels: {0}")]
    Labels(#[from] LabelsError),
    #[error("face locator: {0}")]
    Locator(#[from] LocatorError),
    #[error("overlay font: {0}")]
    Font(#[from] OverlayError),
}

/// Produces collaborators off the engine thread.
pub trait Loader: Send + Sync + 'static {
    fn load(&self) -> Result<Box<dyn Resources>, LoadError>;
}

/// Loaded collaborators, ready to be assembled into a pipeline.
pub trait Resources: Send {
    fn assemble(self: Box<Self>) -> Result<FramePipeline, LoadError>;
}

/// Loads the ONNX classifier, class labels, cascade and font from disk.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    pub classifier_path: PathBuf,
    pub labels_path: PathBuf,
    pub cascade_path: PathBuf,
    pub font_path: Option<PathBuf>,
    pub locator_params: LocatorParams,
    pub max_faces: usize,
}

impl ModelLoader {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            classifier_path: config.classifier_model_path(),
            labels_path: config.labels_path(),
            cascade_path: config.cascade_model_path(),
            font_path: config.font_path(),
            locator_params: config.locator_params(),
            max_faces: config.max_faces,
        }
    }

    /// Load and assemble on the calling thread.
    pub fn load_pipeline(&self) -> Result<FramePipeline, LoadError> {
        self.load()?.assemble()
    }
}

impl Loader for ModelLoader {
    fn load(&self) -> Result<Box<dyn Resources>, LoadError> {
        let cascade_path = self.cascade_path.to_string_lossy().into_owned();
        if !self.cascade_path.exists() {
            return Err(LocatorError::ModelNotFound(cascade_path).into());
        }

        let labels = ClassLabels::load(&self.labels_path)?;
        if labels.is_empty() {
            tracing::warn!(
                path = %self.labels_path.display(),
                "class label list is empty; results will use class_<index> names"
            );
        }

        let classifier = OnnxClassifier::load(&self.classifier_path.to_string_lossy())?;

        let overlay = match &self.font_path {
            Some(path) => {
                let overlay = Overlay::from_font_file(path)?;
                tracing::info!(path = %path.display(), "loaded label font");
                overlay
            }
            None => Overlay::new(None),
        };

        tracing::info!(classes = labels.len(), "collaborators loaded");

        Ok(Box::new(ModelResources {
            classifier,
            labels,
            overlay,
            cascade_path,
            locator_params: self.locator_params,
            max_faces: self.max_faces,
        }))
    }
}

struct ModelResources {
    classifier: OnnxClassifier,
    labels: ClassLabels,
    overlay: Overlay,
    cascade_path: String,
    locator_params: LocatorParams,
    max_faces: usize,
}

impl Resources for ModelResources {
    fn assemble(self: Box<Self>) -> Result<FramePipeline, LoadError> {
        let locator = CascadeLocator::load(&self.cascade_path, &self.locator_params)?;
        Ok(FramePipeline::new(
            Box::new(locator),
            Box::new(self.classifier),
            self.labels,
            self.overlay,
            self.max_faces,
        ))
    }
}
