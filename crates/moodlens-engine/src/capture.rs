//! Capture seams between the engine and the camera.

use moodlens_hw::{Camera, CameraError, Frame};

/// A live frame source. Dropping it releases the underlying device.
pub trait CaptureSource {
    fn next_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Acquires a fresh capture source each time a session starts.
pub trait CaptureProvider: Send {
    fn acquire(&mut self) -> Result<Box<dyn CaptureSource>, CameraError>;
}

impl CaptureSource for Camera {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }
}

/// Opens a V4L2 device by path.
pub struct V4lProvider {
    device: String,
}

impl V4lProvider {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl CaptureProvider for V4lProvider {
    fn acquire(&mut self) -> Result<Box<dyn CaptureSource>, CameraError> {
        let camera = Camera::open(&self.device)?;
        tracing::info!(
            device = %self.device,
            width = camera.width,
            height = camera.height,
            format = ?camera.pixel_format(),
            "camera acquired"
        );
        Ok(Box::new(camera))
    }
}
