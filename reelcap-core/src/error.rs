//! Error taxonomy for the capture workflow
//!
//! Every failure the workflow can surface is a variant of [`CaptureError`].
//! Each variant maps to exactly one human-readable message via
//! [`CaptureError::user_message`], which is what the UI shows in place.

use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;

/// Main error type for capture workflow operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The user (or platform policy) refused camera/microphone access
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// No matching capture device exists
    #[error("Device not found: {reason}")]
    DeviceNotFound {
        /// Failure reason reported by the platform
        reason: String,
    },

    /// Permission prompt or hardware negotiation did not resolve in time
    #[error("Camera acquisition timed out after {duration:?}")]
    AcquisitionTimeout {
        /// Duration after which the attempt was abandoned
        duration: Duration,
    },

    /// The platform has no media capture or recording API
    #[error("Unsupported browser: {missing}")]
    UnsupportedBrowser {
        /// Missing platform capability
        missing: String,
    },

    /// A stream was granted but its video track is not live
    #[error("Camera stream is not active")]
    StreamNotActive,

    /// Recording was requested without a granted camera stream
    #[error("No camera stream available")]
    NoActiveStream,

    /// The preview stream went inactive while it was being monitored
    #[error("Camera stream disconnected")]
    StreamDisconnected,

    /// The preview surface could not be made to play again
    #[error("Playback failed: {reason}")]
    PlaybackFailed {
        /// Failure reason
        reason: String,
    },

    /// No supported recorder container/codec, or the recorder could not be built
    #[error("Recorder unavailable: {reason}")]
    RecorderUnavailable {
        /// Failure reason
        reason: String,
    },

    /// Object storage refused to issue a signed upload destination
    #[error("Signed upload URL request failed: {reason}")]
    SignedUrlError {
        /// Failure reason
        reason: String,
    },

    /// The transfer to the signed destination failed
    #[error("Upload failed: {reason}")]
    UploadFailed {
        /// Failure reason
        reason: String,
    },

    /// The uploaded object could not be attached to the record
    #[error("Record update failed for {record_id}: {reason}")]
    RecordUpdateFailed {
        /// Record that was being updated
        record_id: String,
        /// Failure reason
        reason: String,
    },

    /// Operation is not valid in the current phase
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected phase(s)
        expected: String,
        /// Actual phase
        actual: String,
    },

    /// Missing configuration error
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// A configuration value is present but unusable
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration {
        /// Offending configuration field
        field: String,
        /// Why the value was refused
        reason: String,
    },

    /// Process-level setup such as logging failed
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Failure reason
        reason: String,
    },

    /// Local file system operation failed
    #[error("I/O error: {reason}")]
    Io {
        /// Failure reason
        reason: String,
    },

    /// Anything the platform reported that fits no other variant
    #[error("Unknown error: {reason}")]
    Unknown {
        /// Failure reason
        reason: String,
    },
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

impl CaptureError {
    /// The single message shown to the user for this failure
    pub fn user_message(&self) -> Cow<'static, str> {
        let message = match self {
            CaptureError::PermissionDenied { .. } => "Camera access was denied.",
            CaptureError::DeviceNotFound { .. } => "No camera found.",
            CaptureError::AcquisitionTimeout { .. } => "Camera access timed out.",
            CaptureError::UnsupportedBrowser { .. } => {
                "Your browser does not support video recording."
            }
            CaptureError::StreamNotActive => "Camera stream is not active.",
            CaptureError::NoActiveStream => "No camera stream found.",
            CaptureError::StreamDisconnected => {
                "Camera stream disconnected. Please refresh the page."
            }
            CaptureError::PlaybackFailed { .. } => {
                "Video playback failed. Please refresh the page."
            }
            CaptureError::RecorderUnavailable { .. } => "Failed to start recording.",
            CaptureError::SignedUrlError { .. } | CaptureError::UploadFailed { .. } => {
                "Failed to upload video. Please try again."
            }
            CaptureError::RecordUpdateFailed { .. } => {
                "Video uploaded but could not be saved to your application. Please try again."
            }
            CaptureError::InvalidState { .. } => "That action is not available right now.",
            CaptureError::MissingConfiguration { field } if field == "record_id" => {
                "Missing recordId parameter"
            }
            CaptureError::MissingConfiguration { field } => {
                return Cow::Owned(format!("Missing {field} setting."));
            }
            CaptureError::InvalidConfiguration { field, .. } => {
                return Cow::Owned(format!("Invalid {field} setting."));
            }
            CaptureError::Initialization { .. } => "Could not start the recorder page.",
            CaptureError::Io { .. } => "Could not save the recording to disk.",
            CaptureError::Unknown { .. } => "Unable to access camera.",
        };
        Cow::Borrowed(message)
    }

    /// Check if the user can retry without losing an existing capture
    pub fn is_recoverable(&self) -> bool {
        match self {
            CaptureError::StreamDisconnected => true,
            CaptureError::PlaybackFailed { .. } => true,
            CaptureError::SignedUrlError { .. } => true,
            CaptureError::UploadFailed { .. } => true,
            CaptureError::RecordUpdateFailed { .. } => true,
            CaptureError::Io { .. } => true,
            CaptureError::UnsupportedBrowser { .. } => false,
            CaptureError::RecorderUnavailable { .. } => false,
            CaptureError::MissingConfiguration { .. } => false,
            CaptureError::InvalidConfiguration { .. } => false,
            // Acquisition failures need a full re-acquire
            _ => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CaptureError::PermissionDenied { .. }
            | CaptureError::DeviceNotFound { .. }
            | CaptureError::AcquisitionTimeout { .. }
            | CaptureError::UnsupportedBrowser { .. }
            | CaptureError::StreamNotActive
            | CaptureError::Unknown { .. } => ErrorCategory::Acquisition,
            CaptureError::StreamDisconnected | CaptureError::PlaybackFailed { .. } => {
                ErrorCategory::Playback
            }
            CaptureError::RecorderUnavailable { .. } => ErrorCategory::Recording,
            CaptureError::SignedUrlError { .. }
            | CaptureError::UploadFailed { .. }
            | CaptureError::RecordUpdateFailed { .. } => ErrorCategory::Upload,
            CaptureError::NoActiveStream | CaptureError::InvalidState { .. } => {
                ErrorCategory::State
            }
            CaptureError::MissingConfiguration { .. }
            | CaptureError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            CaptureError::Io { .. } | CaptureError::Initialization { .. } => ErrorCategory::System,
        }
    }

    /// `InvalidConfiguration` for `field`
    pub fn invalid_config(field: &str, reason: impl std::fmt::Display) -> Self {
        CaptureError::InvalidConfiguration {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    /// `InvalidState` for an operation attempted in the wrong phase
    pub fn invalid_state(expected: &str, actual: impl std::fmt::Display) -> Self {
        CaptureError::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io {
            reason: err.to_string(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Camera/microphone acquisition
    Acquisition,
    /// Live preview playback
    Playback,
    /// Recorder construction
    Recording,
    /// Object storage and record update
    Upload,
    /// Operation attempted in the wrong phase
    State,
    /// Configuration errors
    Configuration,
    /// Local system errors
    System,
}
