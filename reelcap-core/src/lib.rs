//! # reelcap core
//!
//! Shared types for the reelcap video capture workflow: the error taxonomy,
//! quality presets, the phase machine, the recorded capture and upload
//! progress.

#![warn(clippy::all)]

pub mod capture;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod session;

pub use capture::{Capture, UploadProgress};
pub use config::{CaptureConfig, QualityPreset, VideoResolution};
pub use error::{CaptureError, CaptureResult, ErrorCategory};
pub use lifecycle::Lifecycle;
pub use session::{CaptureSession, Phase, RecordId};

/// Best-practice tips shown in the instructions phase
pub const INSTRUCTIONS: [&str; 5] = [
    "Find a quiet, well-lit location",
    "Position yourself in the center of the frame",
    "Look directly at the camera",
    "Speak clearly and at a moderate pace",
    "Keep your video to 2 minutes or less",
];
