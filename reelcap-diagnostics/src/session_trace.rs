//! Per-session trace of phases, recording size and upload attempts

use chrono::{DateTime, Utc};
use reelcap_core::{CaptureSession, Phase};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A phase entered during the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: String,
    pub entered_at: DateTime<Utc>,
}

/// One upload attempt and how it ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAttempt {
    pub bytes: usize,
    pub elapsed: Duration,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl UploadAttempt {
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Accumulates what happened in one capture session
#[derive(Debug, Clone)]
pub struct SessionTrace {
    session_id: Uuid,
    record_id: String,
    started_at: DateTime<Utc>,
    phases: Vec<PhaseRecord>,
    recordings: Vec<usize>,
    uploads: Vec<UploadAttempt>,
    errors: Vec<String>,
}

impl SessionTrace {
    /// Start tracing `session`; its current phase is the first entry
    pub fn new(session: &CaptureSession) -> Self {
        let now = Utc::now();
        Self {
            session_id: session.id(),
            record_id: session.record_id().to_string(),
            started_at: now,
            phases: vec![PhaseRecord {
                phase: session.phase().name().to_string(),
                entered_at: now,
            }],
            recordings: Vec::new(),
            uploads: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record_phase(&mut self, phase: &Phase) {
        self.phases.push(PhaseRecord {
            phase: phase.name().to_string(),
            entered_at: Utc::now(),
        });
    }

    /// A recording stopped with `bytes` of captured data
    pub fn record_capture(&mut self, bytes: usize) {
        self.recordings.push(bytes);
    }

    pub fn record_upload(&mut self, attempt: UploadAttempt) {
        self.uploads.push(attempt);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    pub fn uploads(&self) -> &[UploadAttempt] {
        &self.uploads
    }

    /// Snapshot for serialisation
    pub fn report(&self) -> SessionReport {
        let successful: Vec<&UploadAttempt> = self.uploads.iter().filter(|u| u.succeeded).collect();
        let upload_throughput = successful.last().map(|u| u.bytes_per_second());

        SessionReport {
            session_id: self.session_id,
            record_id: self.record_id.clone(),
            started_at: self.started_at,
            generated_at: Utc::now(),
            phases: self.phases.clone(),
            recordings: self.recordings.len(),
            recorded_bytes: self.recordings.last().copied().unwrap_or(0),
            upload_attempts: self.uploads.len(),
            upload_throughput,
            errors: self.errors.clone(),
        }
    }
}

/// Serialisable summary of a [`SessionTrace`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub record_id: String,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub phases: Vec<PhaseRecord>,
    /// Recordings made, including discarded ones
    pub recordings: usize,
    /// Size of the most recent recording
    pub recorded_bytes: usize,
    pub upload_attempts: usize,
    /// Bytes per second of the successful attempt
    pub upload_throughput: Option<f64>,
    pub errors: Vec<String>,
}

impl SessionReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcap_core::{QualityPreset, RecordId};

    #[test]
    fn test_trace_summarises_session() {
        let session = CaptureSession::new(RecordId::new("rec1").unwrap(), QualityPreset::Standard);
        let mut trace = SessionTrace::new(&session);

        trace.record_phase(&Phase::CameraPreview);
        trace.record_phase(&Phase::Recording);
        trace.record_phase(&Phase::Review);
        trace.record_capture(4_000);
        trace.record_phase(&Phase::Uploading);
        trace.record_upload(UploadAttempt {
            bytes: 4_000,
            elapsed: Duration::from_secs(2),
            succeeded: true,
            error: None,
        });

        let report = trace.report();
        let names: Vec<&str> = report.phases.iter().map(|p| p.phase.as_str()).collect();
        assert_eq!(
            names,
            vec!["instructions", "camera-preview", "recording", "review", "uploading"]
        );
        assert_eq!(report.recorded_bytes, 4_000);
        assert_eq!(report.upload_throughput, Some(2_000.0));

        let json = report.to_json().unwrap();
        let back: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.record_id, "rec1");
    }

    #[test]
    fn test_failed_uploads_have_no_throughput() {
        let session = CaptureSession::new(RecordId::new("rec2").unwrap(), QualityPreset::High);
        let mut trace = SessionTrace::new(&session);
        trace.record_upload(UploadAttempt {
            bytes: 10,
            elapsed: Duration::from_millis(5),
            succeeded: false,
            error: Some("Upload failed: offline".to_string()),
        });

        let report = trace.report();
        assert_eq!(report.upload_attempts, 1);
        assert_eq!(report.upload_throughput, None);
    }
}
