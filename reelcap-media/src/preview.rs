//! Live preview binding
//!
//! Attaches a camera stream to a visual surface and keeps it rendering. While
//! recording, a frame-scheduled monitor re-plays the surface whenever it is
//! found paused, and externally triggered pauses are answered with a single
//! rebind + replay. Everything is torn down by [`PreviewBinding::release`] (or
//! on drop) so no callback fires afterwards.

use async_trait::async_trait;
use parking_lot::Mutex;
use reelcap_core::{CaptureConfig, CaptureError, CaptureResult, Lifecycle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::stream::MediaStream;

/// How much media data the surface has buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SurfaceReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// Events raised by the surface itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    CanPlay,
    Play,
    Pause,
    Error(String),
}

/// Something that can render a live stream (a `<video>` element, a window...)
#[async_trait]
pub trait PreviewSurface: Send + Sync {
    /// Id of the stream currently attached, if any
    fn attached_stream(&self) -> Option<String>;
    fn attach(&self, stream: &MediaStream);
    fn detach(&self);
    fn is_paused(&self) -> bool;
    fn ready_state(&self) -> SurfaceReadyState;
    async fn play(&self) -> Result<(), String>;
    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent>;
}

/// Source of display-frame ticks for the playback monitor
#[async_trait]
pub trait FrameClock: Send + Sync {
    async fn next_frame(&self);
}

/// Frame clock that approximates display refresh with a fixed period
#[derive(Debug, Clone)]
pub struct IntervalFrameClock {
    period: Duration,
}

impl IntervalFrameClock {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Default for IntervalFrameClock {
    fn default() -> Self {
        // ~60 Hz
        Self::new(Duration::from_millis(16))
    }
}

#[async_trait]
impl FrameClock for IntervalFrameClock {
    async fn next_frame(&self) {
        tokio::time::sleep(self.period).await;
    }
}

/// Preview binding events
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    /// Stream attached to the surface
    Bound { stream_id: String },
    /// Surface was paused and is playing again
    PlaybackResumed,
    /// A pause during recording was intercepted
    PauseSuppressed,
    /// Unrecoverable for this attempt; monitoring has stopped
    Fault(CaptureError),
}

enum Flow {
    Continue,
    Halt,
}

struct PlaybackKeeper {
    surface: Arc<dyn PreviewSurface>,
    stream: MediaStream,
    retry_interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
    recording: AtomicBool,
    halted: AtomicBool,
    events: broadcast::Sender<PreviewEvent>,
    lifecycle: Lifecycle,
}

impl PlaybackKeeper {
    fn emit(&self, event: PreviewEvent) {
        if self.lifecycle.is_mounted() {
            let _ = self.events.send(event);
        }
    }

    fn fault(&self, error: CaptureError) {
        if !self.halted.swap(true, Ordering::AcqRel) {
            warn!(stream = self.stream.id(), error = %error, "Preview fault");
            self.emit(PreviewEvent::Fault(error));
        }
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    async fn ensure_playing(&self) -> Flow {
        if !self.surface.is_paused() {
            return Flow::Continue;
        }

        {
            let now = Instant::now();
            let mut last = self.last_attempt.lock();
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.retry_interval {
                    return Flow::Continue;
                }
            }
            *last = Some(now);
        }

        if !self.stream.is_active() {
            self.fault(CaptureError::StreamDisconnected);
            return Flow::Halt;
        }

        if self.surface.ready_state() < SurfaceReadyState::HaveCurrentData {
            debug!("Surface not ready, waiting");
            return Flow::Continue;
        }

        match self.surface.play().await {
            Ok(()) => {
                debug!("Video playback maintained");
                self.emit(PreviewEvent::PlaybackResumed);
                Flow::Continue
            }
            Err(reason) => {
                warn!(%reason, "Failed to maintain video playback");
                match self.recover().await {
                    Ok(()) => Flow::Continue,
                    Err(err) => {
                        self.fault(err);
                        Flow::Halt
                    }
                }
            }
        }
    }

    /// Rebind the stream and play once
    async fn recover(&self) -> CaptureResult<()> {
        if !self.stream.is_active() {
            return Err(CaptureError::StreamDisconnected);
        }

        self.surface.attach(&self.stream);
        self.surface
            .play()
            .await
            .map_err(|reason| CaptureError::PlaybackFailed { reason })?;
        self.emit(PreviewEvent::PlaybackResumed);
        Ok(())
    }

    async fn on_surface_event(&self, event: SurfaceEvent) {
        if self.is_halted() {
            return;
        }

        match event {
            SurfaceEvent::Pause if self.is_recording() => {
                debug!("Pause event suppressed during recording");
                self.emit(PreviewEvent::PauseSuppressed);
                if let Err(err) = self.recover().await {
                    self.fault(err);
                }
            }
            SurfaceEvent::Pause => debug!("Preview paused"),
            SurfaceEvent::CanPlay if self.is_recording() => {
                let _ = self.ensure_playing().await;
            }
            SurfaceEvent::CanPlay | SurfaceEvent::Play => {}
            SurfaceEvent::Error(reason) => {
                self.fault(CaptureError::PlaybackFailed { reason });
            }
        }
    }
}

/// Creates [`PreviewBinding`]s
#[derive(Clone)]
pub struct PreviewBinder {
    retry_interval: Duration,
    clock: Arc<dyn FrameClock>,
}

impl PreviewBinder {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            retry_interval: config.play_retry_interval,
            clock: Arc::new(IntervalFrameClock::default()),
        }
    }

    /// Use a custom frame clock for the monitor loop
    pub fn with_clock(mut self, clock: Arc<dyn FrameClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach `stream` to `surface` and start listening for surface events
    pub async fn bind(
        &self,
        surface: Arc<dyn PreviewSurface>,
        stream: MediaStream,
        lifecycle: Lifecycle,
    ) -> PreviewBinding {
        if surface.attached_stream().as_deref() != Some(stream.id()) {
            surface.attach(&stream);
            info!(stream = stream.id(), "Video stream connected to surface");
        }

        let (events, initial_rx) = broadcast::channel(64);
        let keeper = Arc::new(PlaybackKeeper {
            surface: surface.clone(),
            stream: stream.clone(),
            retry_interval: self.retry_interval,
            last_attempt: Mutex::new(None),
            recording: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            events,
            lifecycle,
        });
        keeper.emit(PreviewEvent::Bound {
            stream_id: stream.id().to_string(),
        });

        let mut surface_events = surface.subscribe();
        let listener_keeper = keeper.clone();
        let listener = tokio::spawn(async move {
            loop {
                match surface_events.recv().await {
                    Ok(event) => listener_keeper.on_surface_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Surface event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if surface.is_paused() {
            if let Err(reason) = surface.play().await {
                warn!(%reason, "Initial preview play failed");
            }
        }

        PreviewBinding {
            keeper,
            clock: self.clock.clone(),
            listener: Some(listener),
            monitor: None,
            initial_rx: Some(initial_rx),
            released: false,
        }
    }
}

/// A stream bound to a surface; the single owner of all preview callbacks
pub struct PreviewBinding {
    keeper: Arc<PlaybackKeeper>,
    clock: Arc<dyn FrameClock>,
    listener: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    initial_rx: Option<broadcast::Receiver<PreviewEvent>>,
    released: bool,
}

impl PreviewBinding {
    pub fn stream(&self) -> &MediaStream {
        &self.keeper.stream
    }

    /// Receive binding events; the first call also sees events raised during bind
    pub fn subscribe(&mut self) -> broadcast::Receiver<PreviewEvent> {
        self.initial_rx
            .take()
            .unwrap_or_else(|| self.keeper.events.subscribe())
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().map(|m| !m.is_finished()).unwrap_or(false)
    }

    /// Enter recording mode: suppress pauses and start the monitor loop
    pub fn start_monitoring(&mut self) {
        self.keeper.recording.store(true, Ordering::Release);
        if self.is_monitoring() {
            return;
        }

        let keeper = self.keeper.clone();
        let clock = self.clock.clone();
        self.monitor = Some(tokio::spawn(async move {
            loop {
                clock.next_frame().await;
                if !keeper.lifecycle.is_mounted() || !keeper.is_recording() || keeper.is_halted()
                {
                    break;
                }
                if let Flow::Halt = keeper.ensure_playing().await {
                    break;
                }
            }
            debug!("Playback monitor stopped");
        }));
    }

    /// Leave recording mode and cancel the monitor loop
    pub fn stop_monitoring(&mut self) {
        self.keeper.recording.store(false, Ordering::Release);
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }

    /// Cancel every task and detach the surface
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stop_monitoring();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.keeper.surface.detach();
        debug!(stream = self.keeper.stream.id(), "Preview binding released");
    }
}

impl Drop for PreviewBinding {
    fn drop(&mut self) {
        self.shutdown();
    }
}
