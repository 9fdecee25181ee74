//! Media stream and track handles
//!
//! A [`MediaStream`] is a cheap-to-clone handle over the platform's tracks.
//! Cloning shares the same tracks; exactly one owner is responsible for
//! calling [`MediaStream::stop_all_tracks`] before the handle is dropped.

use reelcap_core::{QualityPreset, VideoResolution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Track media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Track ready state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackReadyState {
    Live,
    Ended,
}

/// Settings the platform actually applied to a track
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

impl TrackSettings {
    pub fn resolution(&self) -> Option<VideoResolution> {
        Some(VideoResolution::new(self.width?, self.height?))
    }
}

/// One audio or video track owned by the platform
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    fn ready_state(&self) -> TrackReadyState;
    fn settings(&self) -> TrackSettings;
    /// Release the underlying device; idempotent
    fn stop(&self);
}

/// Constraints passed to the platform when requesting capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub ideal_frame_rate: u32,
}

impl MediaConstraints {
    /// Combined audio+video constraints with ideal hints for `preset`
    pub fn for_preset(preset: QualityPreset, frame_rate: u32) -> Self {
        let resolution = preset.resolution();
        Self {
            audio: true,
            ideal_width: resolution.width,
            ideal_height: resolution.height,
            ideal_frame_rate: frame_rate,
        }
    }

    pub fn ideal_resolution(&self) -> VideoResolution {
        VideoResolution::new(self.ideal_width, self.ideal_height)
    }
}

/// Handle over a set of platform tracks
#[derive(Clone)]
pub struct MediaStream {
    id: String,
    tracks: Arc<Vec<Arc<dyn MediaTrack>>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks: Arc::new(tracks),
        }
    }

    /// Stream identity; two handles with the same id refer to the same tracks
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter()
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// A stream is active while any of its tracks is live
    pub fn is_active(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.ready_state() == TrackReadyState::Live)
    }

    /// Whether the first video track is live
    pub fn has_live_video(&self) -> bool {
        self.video_tracks()
            .next()
            .map(|t| t.ready_state() == TrackReadyState::Live)
            .unwrap_or(false)
    }

    /// Settings of the first video track
    pub fn video_settings(&self) -> Option<TrackSettings> {
        self.video_tracks().next().map(|t| t.settings())
    }

    /// Stop every track; safe to call more than once
    pub fn stop_all_tracks(&self) {
        for track in self.tracks.iter() {
            track.stop();
        }
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("active", &self.is_active())
            .finish()
    }
}
