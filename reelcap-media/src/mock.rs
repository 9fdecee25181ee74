//! In-process platform backends for tests, demos and headless runs

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reelcap_core::CaptureResult;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::devices::{DeviceError, MediaDevices};
use crate::preview::{PreviewSurface, SurfaceEvent, SurfaceReadyState};
use crate::recorder::{MediaRecorderBackend, MediaRecorderFactory, RecorderOptions, RecorderState};
use crate::stream::{
    MediaConstraints, MediaStream, MediaTrack, TrackKind, TrackReadyState, TrackSettings,
};

/// Virtual track
#[derive(Debug)]
pub struct MockTrack {
    id: String,
    kind: TrackKind,
    settings: TrackSettings,
    live: AtomicBool,
}

impl MockTrack {
    pub fn new(kind: TrackKind, settings: TrackSettings, live: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            settings,
            live: AtomicBool::new(live),
        }
    }

    /// Simulate the device being unplugged
    pub fn end(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl MediaTrack for MockTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn ready_state(&self) -> TrackReadyState {
        if self.live.load(Ordering::Acquire) {
            TrackReadyState::Live
        } else {
            TrackReadyState::Ended
        }
    }

    fn settings(&self) -> TrackSettings {
        self.settings
    }

    fn stop(&self) {
        self.end();
    }
}

/// How [`MockMediaDevices`] answers capture requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockDeviceBehavior {
    /// Grant a live stream honouring the ideal hints
    Grant,
    /// Grant a stream whose video track is already ended
    GrantEnded,
    /// User refuses permission
    Deny,
    /// No camera attached
    NoDevice,
    /// Never answer
    Hang,
    /// Capture API missing
    Unsupported,
    /// Some other platform failure
    Fail(String),
}

/// Virtual camera + microphone
#[derive(Debug)]
pub struct MockMediaDevices {
    behavior: Mutex<MockDeviceBehavior>,
    requests: Mutex<Vec<MediaConstraints>>,
    issued: Mutex<Vec<MediaStream>>,
}

impl MockMediaDevices {
    pub fn new(behavior: MockDeviceBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            requests: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn granting() -> Self {
        Self::new(MockDeviceBehavior::Grant)
    }

    pub fn set_behavior(&self, behavior: MockDeviceBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of capture requests received
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_constraints(&self) -> Option<MediaConstraints> {
        self.requests.lock().last().cloned()
    }

    /// Every stream handed out so far, oldest first
    pub fn issued_streams(&self) -> Vec<MediaStream> {
        self.issued.lock().clone()
    }

    fn build_stream(constraints: &MediaConstraints, video_live: bool) -> MediaStream {
        let video = MockTrack::new(
            TrackKind::Video,
            TrackSettings {
                width: Some(constraints.ideal_width),
                height: Some(constraints.ideal_height),
                frame_rate: Some(f64::from(constraints.ideal_frame_rate)),
            },
            video_live,
        );
        let mut tracks: Vec<Arc<dyn MediaTrack>> = vec![Arc::new(video)];
        if constraints.audio {
            tracks.push(Arc::new(MockTrack::new(
                TrackKind::Audio,
                TrackSettings::default(),
                true,
            )));
        }
        MediaStream::new(Uuid::new_v4().to_string(), tracks)
    }
}

impl Default for MockMediaDevices {
    fn default() -> Self {
        Self::granting()
    }
}

#[async_trait]
impl MediaDevices for MockMediaDevices {
    fn is_supported(&self) -> bool {
        *self.behavior.lock() != MockDeviceBehavior::Unsupported
    }

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, DeviceError> {
        self.requests.lock().push(constraints.clone());
        let behavior = self.behavior.lock().clone();

        let stream = match behavior {
            MockDeviceBehavior::Grant => Self::build_stream(constraints, true),
            MockDeviceBehavior::GrantEnded => Self::build_stream(constraints, false),
            MockDeviceBehavior::Deny => {
                return Err(DeviceError::NotAllowed("Permission denied".to_string()))
            }
            MockDeviceBehavior::NoDevice => {
                return Err(DeviceError::NotFound("Requested device not found".to_string()))
            }
            MockDeviceBehavior::Hang => futures::future::pending().await,
            MockDeviceBehavior::Unsupported => {
                return Err(DeviceError::Unsupported("getUserMedia".to_string()))
            }
            MockDeviceBehavior::Fail(reason) => return Err(DeviceError::Other(reason)),
        };

        self.issued.lock().push(stream.clone());
        Ok(stream)
    }
}

/// Virtual `<video>` element
#[derive(Debug)]
pub struct MockSurface {
    attached: Mutex<Option<String>>,
    paused: AtomicBool,
    ready: Mutex<SurfaceReadyState>,
    failing_plays: AtomicU32,
    play_calls: AtomicUsize,
    attach_calls: AtomicUsize,
    events: broadcast::Sender<SurfaceEvent>,
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSurface {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            attached: Mutex::new(None),
            paused: AtomicBool::new(true),
            ready: Mutex::new(SurfaceReadyState::HaveEnoughData),
            failing_plays: AtomicU32::new(0),
            play_calls: AtomicUsize::new(0),
            attach_calls: AtomicUsize::new(0),
            events,
        }
    }

    /// Pause from outside, as the browser or user would
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        let _ = self.events.send(SurfaceEvent::Pause);
    }

    /// Raise a media error
    pub fn raise_error(&self, reason: &str) {
        let _ = self.events.send(SurfaceEvent::Error(reason.to_string()));
    }

    /// Make the next `count` play calls fail
    pub fn fail_next_plays(&self, count: u32) {
        self.failing_plays.store(count, Ordering::Release);
    }

    pub fn set_ready_state(&self, state: SurfaceReadyState) {
        *self.ready.lock() = state;
    }

    pub fn play_calls(&self) -> usize {
        self.play_calls.load(Ordering::Acquire)
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl PreviewSurface for MockSurface {
    fn attached_stream(&self) -> Option<String> {
        self.attached.lock().clone()
    }

    fn attach(&self, stream: &MediaStream) {
        *self.attached.lock() = Some(stream.id().to_string());
        self.attach_calls.fetch_add(1, Ordering::AcqRel);
    }

    fn detach(&self) {
        *self.attached.lock() = None;
        self.paused.store(true, Ordering::Release);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn ready_state(&self) -> SurfaceReadyState {
        *self.ready.lock()
    }

    async fn play(&self) -> Result<(), String> {
        self.play_calls.fetch_add(1, Ordering::AcqRel);
        let failing = self
            .failing_plays
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("NotAllowedError: play() request was interrupted".to_string());
        }
        self.paused.store(false, Ordering::Release);
        let _ = self.events.send(SurfaceEvent::Play);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }
}

/// Virtual `MediaRecorder` factory emitting synthetic slices
#[derive(Debug)]
pub struct MockRecorderFactory {
    supported: Vec<String>,
    created: AtomicUsize,
}

impl Default for MockRecorderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecorderFactory {
    /// Supports every WebM variant
    pub fn new() -> Self {
        Self::with_supported(vec![
            "video/webm;codecs=vp9,opus".to_string(),
            "video/webm;codecs=vp8,opus".to_string(),
            "video/webm".to_string(),
        ])
    }

    /// Supports nothing; every recording attempt fails
    pub fn unsupported() -> Self {
        Self::with_supported(Vec::new())
    }

    pub fn with_supported(supported: Vec<String>) -> Self {
        Self {
            supported,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of encoders constructed
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }
}

impl MediaRecorderFactory for MockRecorderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn create(
        &self,
        _stream: &MediaStream,
        options: &RecorderOptions,
    ) -> CaptureResult<Box<dyn MediaRecorderBackend>> {
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MockRecorderBackend {
            bits_per_second: options.video_bits_per_second,
            task: None,
        }))
    }
}

struct MockRecorderBackend {
    bits_per_second: u32,
    task: Option<JoinHandle<()>>,
}

impl MediaRecorderBackend for MockRecorderBackend {
    fn start(
        &mut self,
        timeslice: Duration,
        sink: mpsc::UnboundedSender<Bytes>,
    ) -> CaptureResult<()> {
        let slice_len = (u128::from(self.bits_per_second) / 8 * timeslice.as_millis() / 1000) as usize;
        self.task = Some(tokio::spawn(async move {
            let mut sequence: u8 = 0;
            loop {
                tokio::time::sleep(timeslice).await;
                sequence = sequence.wrapping_add(1);
                if sink.send(Bytes::from(vec![sequence; slice_len])).is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn state(&self) -> RecorderState {
        match &self.task {
            Some(task) if !task.is_finished() => RecorderState::Recording,
            _ => RecorderState::Inactive,
        }
    }
}
