//! Recording duration timer
//!
//! Counts whole seconds while a recording runs, raises a warning at the
//! configured threshold and reports the cap exactly once. Stopping the
//! recording at the cap is the caller's job.

use reelcap_core::{CaptureConfig, Lifecycle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Timer notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One more second elapsed
    Tick { elapsed: u32 },
    /// Warning threshold reached
    Warning { elapsed: u32, remaining: u32 },
    /// Maximum duration reached; no further events follow
    CapReached { elapsed: u32 },
}

fn whole_seconds(duration: Duration) -> u32 {
    u32::try_from(duration.as_secs()).unwrap_or(u32::MAX)
}

/// Factory for per-recording timer tasks
#[derive(Debug, Clone, Copy)]
pub struct RecordingTimer {
    warning_at: u32,
    cap: u32,
}

impl RecordingTimer {
    /// Thresholds are whole seconds; `CaptureConfig::validate` rejects anything else
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            warning_at: whole_seconds(config.duration_warning),
            cap: whole_seconds(config.max_duration).max(1),
        }
    }

    pub fn cap_seconds(&self) -> u32 {
        self.cap
    }

    /// Whether `seconds` should be displayed in the warning style
    pub fn is_warning(&self, seconds: u32) -> bool {
        seconds >= self.warning_at
    }

    /// Render seconds as `m:ss`
    pub fn format(seconds: u32) -> String {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }

    /// Start counting from zero
    pub fn start(&self, lifecycle: Lifecycle) -> TimerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let warning_at = self.warning_at;
        let cap = self.cap;

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut elapsed: u32 = 0;
            loop {
                // Anchor to the start so ticks do not drift
                tokio::time::sleep_until(started + Duration::from_secs(u64::from(elapsed) + 1))
                    .await;
                elapsed += 1;

                if !lifecycle.is_mounted() || tx.send(TimerEvent::Tick { elapsed }).is_err() {
                    break;
                }

                if elapsed == warning_at {
                    debug!(elapsed, "Recording duration warning");
                    let _ = tx.send(TimerEvent::Warning {
                        elapsed,
                        remaining: cap.saturating_sub(elapsed),
                    });
                }

                if elapsed >= cap {
                    info!(elapsed, "Recording duration cap reached");
                    let _ = tx.send(TimerEvent::CapReached { elapsed });
                    break;
                }
            }
        });

        TimerHandle {
            task,
            events: rx,
        }
    }
}

/// Running timer; cancelled on drop
pub struct TimerHandle {
    task: JoinHandle<()>,
    events: mpsc::UnboundedReceiver<TimerEvent>,
}

impl TimerHandle {
    /// Next timer event; `None` once the timer has finished or been cancelled
    pub async fn recv(&mut self) -> Option<TimerEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TimerEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel(&mut self) {
        self.task.abort();
        self.events.close();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
