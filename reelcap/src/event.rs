//! Events published by a running capture workflow

use reelcap_core::{CaptureError, Phase};
use tokio::sync::broadcast;

/// Something the UI should react to
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// The workflow moved to another phase
    PhaseChanged {
        /// Phase that was left
        from: Phase,
        /// Phase that was entered
        to: Phase,
    },
    /// The preview surface is showing a new stream
    PreviewBound {
        /// Stream identity
        stream_id: String,
    },
    /// A stalled preview was made to play again
    PlaybackResumed,
    /// A pause during recording was intercepted
    PauseSuppressed,
    /// The preview cannot be kept alive for this attempt
    PreviewFault {
        /// What went wrong
        error: CaptureError,
    },
    /// One more recorded second
    TimerTick {
        /// Seconds since recording started
        elapsed_seconds: u32,
        /// `m:ss` rendering of `elapsed_seconds`
        display: String,
        /// Whether the warning style applies
        warning: bool,
    },
    /// The recording is approaching its cap
    DurationWarning {
        /// Seconds since recording started
        elapsed_seconds: u32,
        /// Seconds left before the automatic stop
        remaining_seconds: u32,
    },
    /// The cap was hit and the recording was stopped
    DurationCapReached {
        /// Seconds recorded
        elapsed_seconds: u32,
    },
    /// Upload percentage changed
    UploadProgress {
        /// 0-100
        percent: u8,
    },
    /// An operation failed; `message` is what the user sees
    Error {
        /// The failure
        error: CaptureError,
        /// Human readable message
        message: String,
    },
}

impl WorkflowEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::PhaseChanged { .. } => "phase_changed",
            WorkflowEvent::PreviewBound { .. } => "preview_bound",
            WorkflowEvent::PlaybackResumed => "playback_resumed",
            WorkflowEvent::PauseSuppressed => "pause_suppressed",
            WorkflowEvent::PreviewFault { .. } => "preview_fault",
            WorkflowEvent::TimerTick { .. } => "timer_tick",
            WorkflowEvent::DurationWarning { .. } => "duration_warning",
            WorkflowEvent::DurationCapReached { .. } => "duration_cap_reached",
            WorkflowEvent::UploadProgress { .. } => "upload_progress",
            WorkflowEvent::Error { .. } => "error",
        }
    }

    /// Check if this event comes from the recording timer
    pub fn is_timer_event(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::TimerTick { .. }
                | WorkflowEvent::DurationWarning { .. }
                | WorkflowEvent::DurationCapReached { .. }
        )
    }

    /// Check if this event comes from the preview binding
    pub fn is_preview_event(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::PreviewBound { .. }
                | WorkflowEvent::PlaybackResumed
                | WorkflowEvent::PauseSuppressed
                | WorkflowEvent::PreviewFault { .. }
        )
    }

    /// The error carried by this event, if any
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            WorkflowEvent::PreviewFault { error } | WorkflowEvent::Error { error, .. } => {
                Some(error)
            }
            WorkflowEvent::PhaseChanged {
                to: Phase::UploadFailed { error },
                ..
            } => Some(error),
            _ => None,
        }
    }
}

/// Receiving end of a workflow's event channel
#[derive(Debug)]
pub struct EventStream {
    rx: broadcast::Receiver<WorkflowEvent>,
}

impl EventStream {
    pub(crate) fn new(rx: broadcast::Receiver<WorkflowEvent>) -> Self {
        Self { rx }
    }

    /// Next event; `None` once the workflow is gone
    ///
    /// Events missed because the receiver fell behind are skipped.
    pub async fn next(&mut self) -> Option<WorkflowEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event without waiting
    pub fn try_next(&mut self) -> Option<WorkflowEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
