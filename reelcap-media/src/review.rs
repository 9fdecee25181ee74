//! Review gate between recording and upload
//!
//! Holds the finished capture in memory. No network calls happen here.

use reelcap_core::{Capture, CaptureResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Accept, retry or export a finished capture
#[derive(Debug)]
pub struct ReviewGate {
    capture: Capture,
}

impl ReviewGate {
    pub fn new(capture: Capture) -> Self {
        Self { capture }
    }

    /// The capture, for replay
    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Hand the capture on for upload
    pub fn accept(self) -> Capture {
        info!(size = self.capture.len(), "Capture accepted");
        self.capture
    }

    /// Drop the capture entirely
    pub fn discard(self) {
        info!(size = self.capture.len(), "Capture discarded");
    }

    /// File name used for local export
    pub fn export_file_name(&self) -> String {
        format!(
            "recording-{}.{}",
            self.capture.recorded_at().format("%Y-%m-%dT%H-%M-%S%.3fZ"),
            self.capture.file_extension()
        )
    }

    /// Write the capture into `dir` without uploading it
    pub async fn export_to(&self, dir: &Path) -> CaptureResult<PathBuf> {
        let path = dir.join(self.export_file_name());
        tokio::fs::write(&path, self.capture.data()).await?;
        info!(path = %path.display(), size = self.capture.len(), "Capture exported");
        Ok(path)
    }
}
