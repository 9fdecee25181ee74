//! Chunked recording of a dedicated capture stream
//!
//! The recorder never records the preview stream. [`Recorder::start`] acquires
//! a second, independent stream, hands it to a platform encoder that emits a
//! data slice every timeslice, and [`Recorder::stop`] concatenates the slices
//! in arrival order into one immutable [`Capture`].

use bytes::Bytes;
use reelcap_core::{Capture, CaptureConfig, CaptureError, CaptureResult, QualityPreset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::devices::DeviceAcquisition;
use crate::stream::MediaStream;

/// Encoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Encoder configuration derived from the quality preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderOptions {
    pub mime_type: String,
    pub video_bits_per_second: u32,
}

/// Platform encoder bound to one stream
pub trait MediaRecorderBackend: Send {
    /// Begin encoding, sending a slice to `sink` every `timeslice`
    fn start(&mut self, timeslice: Duration, sink: mpsc::UnboundedSender<Bytes>)
        -> CaptureResult<()>;

    /// Stop encoding; any pending data must be sent to the sink before returning
    fn stop(&mut self);

    fn state(&self) -> RecorderState;
}

/// Builds platform encoders
pub trait MediaRecorderFactory: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create(
        &self,
        stream: &MediaStream,
        options: &RecorderOptions,
    ) -> CaptureResult<Box<dyn MediaRecorderBackend>>;
}

/// Starts and stops recordings
#[derive(Clone)]
pub struct Recorder {
    acquisition: DeviceAcquisition,
    factory: Arc<dyn MediaRecorderFactory>,
    timeslice: Duration,
    mime_candidates: Vec<String>,
}

impl Recorder {
    pub fn new(
        acquisition: DeviceAcquisition,
        factory: Arc<dyn MediaRecorderFactory>,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            acquisition,
            factory,
            timeslice: config.timeslice,
            mime_candidates: config.mime_candidates.clone(),
        }
    }

    /// First container/codec the platform can encode
    pub fn select_mime_type(&self) -> Option<&str> {
        self.mime_candidates
            .iter()
            .map(String::as_str)
            .find(|mime| self.factory.is_type_supported(mime))
    }

    /// Start recording alongside the live `preview` stream
    ///
    /// Fails with `RecorderUnavailable` before any stream is acquired when no
    /// candidate format is supported.
    pub async fn start(
        &self,
        preview: &MediaStream,
        preset: QualityPreset,
    ) -> CaptureResult<RecorderHandle> {
        if !preview.is_active() {
            return Err(CaptureError::NoActiveStream);
        }

        let mime_type = self
            .select_mime_type()
            .ok_or_else(|| CaptureError::RecorderUnavailable {
                reason: format!("none of {:?} is supported", self.mime_candidates),
            })?
            .to_string();
        let options = RecorderOptions {
            mime_type,
            video_bits_per_second: preset.video_bitrate(),
        };

        let stream = self.acquisition.acquire(preset).await?;

        let mut backend = match self.factory.create(&stream, &options) {
            Ok(backend) => backend,
            Err(err) => {
                stream.stop_all_tracks();
                return Err(err);
            }
        };

        let (sink, slices) = mpsc::unbounded_channel();
        if let Err(err) = backend.start(self.timeslice, sink) {
            stream.stop_all_tracks();
            return Err(err);
        }

        info!(
            stream = stream.id(),
            mime = %options.mime_type,
            bitrate = options.video_bits_per_second,
            "Recording started"
        );

        Ok(RecorderHandle {
            backend,
            stream,
            slices,
            options,
            started_at: Instant::now(),
        })
    }

    /// Stop the recording and assemble the capture
    pub async fn stop(&self, handle: RecorderHandle) -> Capture {
        handle.finish()
    }
}

/// An active recording
pub struct RecorderHandle {
    backend: Box<dyn MediaRecorderBackend>,
    stream: MediaStream,
    slices: mpsc::UnboundedReceiver<Bytes>,
    options: RecorderOptions,
    started_at: Instant,
}

impl RecorderHandle {
    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn state(&self) -> RecorderState {
        self.backend.state()
    }

    fn finish(mut self) -> Capture {
        self.backend.stop();
        // The backend has flushed; nothing sent after this point is kept
        self.slices.close();

        let mut collected = Vec::new();
        while let Ok(slice) = self.slices.try_recv() {
            if slice.is_empty() {
                continue;
            }
            debug!(size = slice.len(), "Slice collected");
            collected.push(slice);
        }

        self.stream.stop_all_tracks();
        let capture = Capture::from_slices(collected, self.options.mime_type.clone(), self.elapsed());
        info!(
            size = capture.len(),
            slices = capture.slice_count(),
            duration = ?capture.duration(),
            "Recording stopped, capture created"
        );
        capture
    }

    /// Abandon the recording without producing a capture
    pub fn abort(mut self) {
        self.backend.stop();
        self.slices.close();
        self.stream.stop_all_tracks();
        warn!(stream = self.stream.id(), "Recording aborted");
    }
}
