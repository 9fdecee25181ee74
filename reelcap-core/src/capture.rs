//! Recorded capture and upload progress

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// An immutable recording assembled from the recorder's data slices
#[derive(Debug, Clone)]
pub struct Capture {
    data: Bytes,
    mime_type: String,
    duration: Duration,
    slice_count: usize,
    recorded_at: DateTime<Utc>,
}

impl Capture {
    /// Concatenate slices in arrival order; empty slices are skipped
    pub fn from_slices(slices: Vec<Bytes>, mime_type: impl Into<String>, duration: Duration) -> Self {
        let total: usize = slices.iter().map(Bytes::len).sum();
        let mut buf = BytesMut::with_capacity(total);
        let mut slice_count = 0;
        for slice in slices.iter().filter(|s| !s.is_empty()) {
            buf.extend_from_slice(slice);
            slice_count += 1;
        }

        Self {
            data: buf.freeze(),
            mime_type: mime_type.into(),
            duration,
            slice_count,
            recorded_at: Utc::now(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Full MIME type including codec parameters
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// MIME type without parameters, e.g. `video/webm`
    pub fn container_type(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .map(str::trim)
            .unwrap_or("application/octet-stream")
    }

    /// File extension matching the container
    pub fn file_extension(&self) -> &str {
        match self.container_type() {
            "video/mp4" => "mp4",
            "video/x-matroska" => "mkv",
            _ => "webm",
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn slice_count(&self) -> usize {
        self.slice_count
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Upload percentage (0-100) published to observers
///
/// Values never decrease within one attempt and 100 is reserved for
/// [`UploadProgress::complete`]. Clones share the same value.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    tx: Arc<watch::Sender<u8>>,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadProgress {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Report bytes handed to the transport and return the published value
    pub fn report(&self, bytes_sent: u64, total_bytes: u64) -> u8 {
        let percent = if total_bytes == 0 {
            0
        } else {
            let raw = (bytes_sent as f64 / total_bytes as f64 * 100.0).round();
            raw.clamp(0.0, 99.0) as u8
        };

        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
        self.current()
    }

    /// Mark the transfer as confirmed by the destination
    pub fn complete(&self) {
        self.tx.send_replace(100);
    }

    /// Start a fresh attempt at 0
    pub fn reset(&self) {
        self.tx.send_replace(0);
    }

    pub fn current(&self) -> u8 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }
}
