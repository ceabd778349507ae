//! moodlens-hw — V4L2 camera capture and pixel-format conversion.
//!
//! Opens a streaming camera and hands out RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
