use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Axis-aligned face rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Pixel area, computed wide so large rectangles cannot overflow.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rectangle lies entirely inside a `width` × `height` raster.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

/// Classification outcome for one face in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub label: String,
    /// Softmax probability of `label`, in [0, 1].
    pub confidence: f32,
}

/// A classified face together with where it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub rect: Rectangle,
    pub result: DetectionResult,
}

#[derive(Error, Debug)]
pub enum LabelsError {
    #[error("failed to read class labels from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("class labels must be a JSON array of strings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ordered class names, index-aligned with the classifier's logits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    /// Parse a JSON array of strings, e.g. `["angry", "happy", ...]`.
    pub fn from_json(json: &str) -> Result<Self, LabelsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a labels file.
    pub fn load(path: &Path) -> Result<Self, LabelsError> {
        let json = std::fs::read_to_string(path).map_err(|source| LabelsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Label for `index`, or `class_<index>` when the registry is too short.
    pub fn label_for(&self, index: usize) -> String {
        self.get(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("class_{index}"))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
