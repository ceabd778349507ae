use crate::engine::EngineSettings;
use moodlens_core::{LocatorParams, DEFAULT_MAX_FACES};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
pub const CLASSIFIER_MODEL_FILE: &str = "emotion_yolo11n_cls.onnx";
pub const LABELS_FILE: &str = "classes.json";
pub const CASCADE_MODEL_FILE: &str = "seeta_fd_frontal_v1.0.bin";
/// Picked up from the model directory when no font is configured explicitly.
///
/// Labels start with an emoji, so the font (here or via `MOODLENS_FONT`)
/// must carry outline glyphs for the emoji as well as the label text.
/// Text-only fonts draw a missing-glyph box in place of the emoji.
pub const FONT_FILE: &str = "label_font.ttf";

/// Session configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the model, labels and font files.
    pub model_dir: PathBuf,
    pub classifier_model: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub cascade_model: Option<PathBuf>,
    pub font: Option<PathBuf>,
    /// Faces classified per frame, largest first.
    pub max_faces: usize,
    pub frame_interval_ms: u64,
    /// Consecutive ticks tolerated while models are still loading.
    pub max_pending_ticks: u32,
    pub scale_factor: f32,
    pub min_face_size: u32,
    pub score_threshold: f64,
}

impl EngineConfig {
    /// Load configuration from `MOODLENS_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = LocatorParams::default();
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        Self {
            camera_device: lookup("MOODLENS_CAMERA_DEVICE")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            model_dir: path("MOODLENS_MODEL_DIR").unwrap_or_else(moodlens_core::default_model_dir),
            classifier_model: path("MOODLENS_CLASSIFIER_MODEL"),
            labels: path("MOODLENS_LABELS"),
            cascade_model: path("MOODLENS_CASCADE_MODEL"),
            font: path("MOODLENS_FONT"),
            max_faces: env_parse(&lookup, "MOODLENS_MAX_FACES", DEFAULT_MAX_FACES),
            frame_interval_ms: env_parse(&lookup, "MOODLENS_FRAME_INTERVAL_MS", 16),
            max_pending_ticks: env_parse(&lookup, "MOODLENS_MAX_PENDING_TICKS", 600),
            scale_factor: env_parse(&lookup, "MOODLENS_SCALE_FACTOR", defaults.scale_factor),
            min_face_size: env_parse(&lookup, "MOODLENS_MIN_FACE_SIZE", defaults.min_face_size),
            score_threshold: env_parse(&lookup, "MOODLENS_SCORE_THRESHOLD", defaults.score_threshold),
        }
    }

    /// Path to the ONNX emotion classifier.
    pub fn classifier_model_path(&self) -> PathBuf {
        self.classifier_model
            .clone()
            .unwrap_or_else(|| self.model_dir.join(CLASSIFIER_MODEL_FILE))
    }

    /// Path to the JSON class-label list.
    pub fn labels_path(&self) -> PathBuf {
        self.labels
            .clone()
            .unwrap_or_else(|| self.model_dir.join(LABELS_FILE))
    }

    /// Path to the face cascade model.
    pub fn cascade_model_path(&self) -> PathBuf {
        self.cascade_model
            .clone()
            .unwrap_or_else(|| self.model_dir.join(CASCADE_MODEL_FILE))
    }

    /// The configured font, or the model directory's default font if present.
    pub fn font_path(&self) -> Option<PathBuf> {
        if let Some(font) = &self.font {
            return Some(font.clone());
        }
        let fallback = self.model_dir.join(FONT_FILE);
        fallback.exists().then_some(fallback)
    }

    pub fn locator_params(&self) -> LocatorParams {
        LocatorParams {
            scale_factor: self.scale_factor,
            min_face_size: self.min_face_size,
            score_threshold: self.score_threshold,
            ..LocatorParams::default()
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            frame_interval: Duration::from_millis(self.frame_interval_ms),
            max_pending_ticks: self.max_pending_ticks,
        }
    }
}

fn env_parse<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }
    }
}
