use serde::Serialize;
use std::fmt;

/// Session status published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum Status {
    /// Collaborators are loading in the background.
    Loading,
    /// Collaborators are loaded and the session is not running.
    Ready,
    /// A resource failed to load, or loading never finished in time.
    LoadFailed(String),
    RequestingCamera,
    /// The camera could not be opened; start may be retried.
    CameraFailed(String),
    Running,
    Stopped,
    /// A cycle failed and the session was stopped.
    Faulted(String),
}

impl Status {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::LoadFailed(_) | Self::CameraFailed(_) | Self::Faulted(_)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading models"),
            Self::Ready => write!(f, "ready"),
            Self::LoadFailed(reason) => write!(f, "failed to load models: {reason}"),
            Self::RequestingCamera => write!(f, "requesting camera"),
            Self::CameraFailed(reason) => write!(f, "camera unavailable: {reason}"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Faulted(reason) => write!(f, "stopped after error: {reason}"),
        }
    }
}
