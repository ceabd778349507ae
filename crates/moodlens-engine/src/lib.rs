//! moodlens-engine — live session loop driver.
//!
//! Runs the frame pipeline on a dedicated thread, loads models in the
//! background and publishes results, status and the annotated frame.

pub mod capture;
pub mod config;
pub mod engine;
pub mod loader;
pub mod status;

pub use capture::{CaptureProvider, CaptureSource, V4lProvider};
pub use config::EngineConfig;
pub use engine::{spawn_engine, EngineError, EngineHandle, EngineSettings};
pub use loader::{LoadError, Loader, ModelLoader, Resources};
pub use status::Status;
