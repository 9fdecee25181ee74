//! Capture session state and the phase machine

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::config::QualityPreset;
use crate::error::{CaptureError, CaptureResult};

/// Opaque identifier of the record the finished video is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Create a record id, rejecting blank input
    pub fn new(id: impl Into<String>) -> CaptureResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CaptureError::MissingConfiguration {
                field: "record_id".to_string(),
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow phase
///
/// A single tagged value replaces the independent "is recording" / "show
/// preview" / "show success" flags, so impossible combinations cannot be
/// represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Best-practice instructions; no camera access yet
    Instructions,
    /// Live camera preview, ready to record
    CameraPreview,
    /// Recording in progress
    Recording,
    /// Capture finished, waiting for accept / retry / export
    Review,
    /// Capture is being transferred
    Uploading,
    /// Upload and record update both succeeded
    Succeeded {
        /// Public URL attached to the record
        public_url: String,
    },
    /// Upload failed; the capture is still held for another attempt
    UploadFailed {
        /// What went wrong
        error: CaptureError,
    },
}

impl Phase {
    /// Short name used in logs and state errors
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Instructions => "instructions",
            Phase::CameraPreview => "camera-preview",
            Phase::Recording => "recording",
            Phase::Review => "review",
            Phase::Uploading => "uploading",
            Phase::Succeeded { .. } => "succeeded",
            Phase::UploadFailed { .. } => "upload-failed",
        }
    }

    /// Whether the workflow may move from `self` to `next`
    pub fn can_transition_to(&self, next: &Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Instructions, CameraPreview)
                | (CameraPreview, CameraPreview)
                | (CameraPreview, Recording)
                | (CameraPreview, Instructions)
                | (Recording, Review)
                | (Review, Uploading)
                | (Review, CameraPreview)
                | (Review, Instructions)
                | (Uploading, Succeeded { .. })
                | (Uploading, UploadFailed { .. })
                | (UploadFailed { .. }, Uploading)
                | (UploadFailed { .. }, CameraPreview)
                | (UploadFailed { .. }, Instructions)
        )
    }

    /// Phases in which a capture is held and can be uploaded or exported
    pub fn holds_capture(&self) -> bool {
        matches!(self, Phase::Review | Phase::UploadFailed { .. })
    }

    /// Phases in which the preview surface must be rendering
    pub fn shows_live_preview(&self) -> bool {
        matches!(self, Phase::CameraPreview | Phase::Recording)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ephemeral state of one capture workflow instance
#[derive(Debug, Clone)]
pub struct CaptureSession {
    id: Uuid,
    record_id: RecordId,
    phase: Phase,
    quality: QualityPreset,
    elapsed_seconds: u32,
    error_message: Option<String>,
}

impl CaptureSession {
    pub fn new(record_id: RecordId, quality: QualityPreset) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id,
            phase: Phase::Instructions,
            quality,
            elapsed_seconds: 0,
            error_message: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn quality(&self) -> QualityPreset {
        self.quality
    }

    pub fn set_quality(&mut self, quality: QualityPreset) {
        self.quality = quality;
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    /// Record the timer's latest reading; ignored outside `recording`
    pub fn set_elapsed_seconds(&mut self, seconds: u32) {
        if self.phase == Phase::Recording {
            self.elapsed_seconds = seconds;
        }
    }

    /// Message currently shown to the user, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn report_error(&mut self, error: &CaptureError) {
        self.error_message = Some(error.user_message().to_string());
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Move to `next`, returning the phase that was left
    pub fn transition(&mut self, next: Phase) -> CaptureResult<Phase> {
        if !self.phase.can_transition_to(&next) {
            return Err(CaptureError::invalid_state(
                &format!("a phase that can move to {next}"),
                &self.phase,
            ));
        }

        if next == Phase::Recording {
            self.elapsed_seconds = 0;
        }

        debug!(session = %self.id, from = %self.phase, to = %next, "Phase transition");
        Ok(std::mem::replace(&mut self.phase, next))
    }

    /// Fail unless the session is in one of `allowed`
    pub fn require(&self, allowed: &[&str]) -> CaptureResult<()> {
        if allowed.contains(&self.phase.name()) {
            Ok(())
        } else {
            Err(CaptureError::invalid_state(&allowed.join(" | "), &self.phase))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CaptureSession {
        CaptureSession::new(RecordId::new("rec123").unwrap(), QualityPreset::Standard)
    }

    #[test]
    fn test_record_id_rejects_blank() {
        assert!(RecordId::new("   ").is_err());
        assert_eq!(RecordId::new("recABC").unwrap().as_str(), "recABC");
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = session();
        assert_eq!(s.phase(), &Phase::Instructions);
        s.transition(Phase::CameraPreview).unwrap();
        s.transition(Phase::Recording).unwrap();
        s.transition(Phase::Review).unwrap();
        s.transition(Phase::Uploading).unwrap();
        let previous = s
            .transition(Phase::Succeeded {
                public_url: "https://x/y.webm".into(),
            })
            .unwrap();
        assert_eq!(previous, Phase::Uploading);
        assert!(s.phase().is_terminal());
    }

    #[test]
    fn test_cannot_upload_before_review() {
        let mut s = session();
        s.transition(Phase::CameraPreview).unwrap();
        let err = s.transition(Phase::Uploading).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidState { .. }));
        assert_eq!(s.phase(), &Phase::CameraPreview);
    }

    #[test]
    fn test_cannot_record_from_instructions() {
        let mut s = session();
        assert!(s.transition(Phase::Recording).is_err());
    }

    #[test]
    fn test_elapsed_resets_on_recording_entry() {
        let mut s = session();
        s.transition(Phase::CameraPreview).unwrap();
        s.transition(Phase::Recording).unwrap();
        s.set_elapsed_seconds(42);
        s.transition(Phase::Review).unwrap();
        s.transition(Phase::CameraPreview).unwrap();
        s.set_elapsed_seconds(7);
        assert_eq!(s.elapsed_seconds(), 42);
        s.transition(Phase::Recording).unwrap();
        assert_eq!(s.elapsed_seconds(), 0);
    }

    #[test]
    fn test_upload_failed_allows_retry_upload() {
        let failed = Phase::UploadFailed {
            error: CaptureError::UploadFailed {
                reason: "status 503".into(),
            },
        };
        assert!(failed.can_transition_to(&Phase::Uploading));
        assert!(failed.holds_capture());
    }
}
