//! Tests for the preview binder: rebind guard, pause suppression, monitor
//! throttling and teardown

use async_trait::async_trait;
use reelcap_core::{CaptureConfig, CaptureError, Lifecycle, QualityPreset};
use reelcap_media::mock::{MockMediaDevices, MockSurface};
use reelcap_media::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Frame clock that never ticks, so only surface events drive the binder
struct StalledClock;

#[async_trait]
impl FrameClock for StalledClock {
    async fn next_frame(&self) {
        futures::future::pending::<()>().await
    }
}

/// Surface that accepts `play` but never leaves the paused state
struct StuckSurface {
    plays: AtomicUsize,
    events: broadcast::Sender<SurfaceEvent>,
}

#[async_trait]
impl PreviewSurface for StuckSurface {
    fn attached_stream(&self) -> Option<String> {
        None
    }
    fn attach(&self, _stream: &MediaStream) {}
    fn detach(&self) {}
    fn is_paused(&self) -> bool {
        true
    }
    fn ready_state(&self) -> SurfaceReadyState {
        SurfaceReadyState::HaveEnoughData
    }
    async fn play(&self) -> Result<(), String> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.events.subscribe()
    }
}

async fn live_stream() -> MediaStream {
    let devices = Arc::new(MockMediaDevices::granting());
    DeviceAcquisition::new(devices, &CaptureConfig::default())
        .acquire(QualityPreset::Standard)
        .await
        .unwrap()
}

async fn next(rx: &mut broadcast::Receiver<PreviewEvent>) -> PreviewEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("preview event within 1s")
        .expect("channel open")
}

#[tokio::test]
async fn test_bind_attaches_and_plays() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;

    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .bind(surface.clone(), stream.clone(), Lifecycle::new())
        .await;
    let mut events = binding.subscribe();

    assert_eq!(
        next(&mut events).await,
        PreviewEvent::Bound {
            stream_id: stream.id().to_string()
        }
    );
    assert_eq!(surface.attached_stream().as_deref(), Some(stream.id()));
    assert_eq!(surface.attach_calls(), 1);
    assert!(!surface.is_paused());
    binding.release();
}

#[tokio::test]
async fn test_rebind_guard_skips_same_stream() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    surface.attach(&stream);

    let binding = PreviewBinder::new(&CaptureConfig::default())
        .bind(surface.clone(), stream, Lifecycle::new())
        .await;

    assert_eq!(surface.attach_calls(), 1);
    binding.release();
}

#[tokio::test]
async fn test_pause_during_recording_is_recovered_once() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .with_clock(Arc::new(StalledClock))
        .bind(surface.clone(), stream, Lifecycle::new())
        .await;
    let mut events = binding.subscribe();
    assert!(matches!(next(&mut events).await, PreviewEvent::Bound { .. }));

    binding.start_monitoring();
    surface.pause();

    assert_eq!(next(&mut events).await, PreviewEvent::PauseSuppressed);
    assert_eq!(next(&mut events).await, PreviewEvent::PlaybackResumed);
    assert!(!surface.is_paused());
    // bind + rebind during recovery
    assert_eq!(surface.attach_calls(), 2);
    binding.release();
}

#[tokio::test]
async fn test_failed_recovery_surfaces_playback_failed() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .with_clock(Arc::new(StalledClock))
        .bind(surface.clone(), stream, Lifecycle::new())
        .await;
    let mut events = binding.subscribe();
    next(&mut events).await;

    binding.start_monitoring();
    surface.fail_next_plays(1);
    surface.pause();

    assert_eq!(next(&mut events).await, PreviewEvent::PauseSuppressed);
    match next(&mut events).await {
        PreviewEvent::Fault(CaptureError::PlaybackFailed { .. }) => {}
        other => panic!("expected PlaybackFailed, got {other:?}"),
    }

    // Given up: further pauses are not retried
    let plays = surface.play_calls();
    surface.pause();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(surface.play_calls(), plays);
    binding.release();
}

#[tokio::test]
async fn test_pause_outside_recording_is_left_alone() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .with_clock(Arc::new(StalledClock))
        .bind(surface.clone(), stream, Lifecycle::new())
        .await;
    let mut events = binding.subscribe();
    next(&mut events).await;

    surface.pause();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(surface.is_paused());
    assert!(events.try_recv().is_err());
    binding.release();
}

#[tokio::test]
async fn test_disconnected_stream_halts_monitoring() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .bind(surface.clone(), stream.clone(), Lifecycle::new())
        .await;
    let mut events = binding.subscribe();
    next(&mut events).await;

    binding.start_monitoring();
    stream.stop_all_tracks();
    surface.pause();

    loop {
        match next(&mut events).await {
            PreviewEvent::Fault(err) => {
                assert_eq!(err, CaptureError::StreamDisconnected);
                break;
            }
            PreviewEvent::PauseSuppressed => continue,
            other => panic!("unexpected event {other:?}"),
        }
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!binding.is_monitoring());
    binding.release();
}

#[tokio::test]
async fn test_surface_error_is_a_fault() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .bind(surface.clone(), stream, Lifecycle::new())
        .await;
    let mut events = binding.subscribe();
    next(&mut events).await;

    surface.raise_error("MEDIA_ERR_DECODE");

    assert_eq!(
        next(&mut events).await,
        PreviewEvent::Fault(CaptureError::PlaybackFailed {
            reason: "MEDIA_ERR_DECODE".to_string()
        })
    );
    binding.release();
}

#[tokio::test(start_paused = true)]
async fn test_monitor_retries_at_most_every_100ms() {
    let (events, _) = broadcast::channel(16);
    let surface = Arc::new(StuckSurface {
        plays: AtomicUsize::new(0),
        events,
    });
    let stream = live_stream().await;

    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .with_clock(Arc::new(IntervalFrameClock::new(Duration::from_millis(1))))
        .bind(surface.clone(), stream, Lifecycle::new())
        .await;
    let after_bind = surface.plays.load(Ordering::SeqCst);

    binding.start_monitoring();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    binding.stop_monitoring();

    let retries = surface.plays.load(Ordering::SeqCst) - after_bind;
    assert!((9..=11).contains(&retries), "got {retries} retries in 1s");
    binding.release();
}

#[tokio::test]
async fn test_release_detaches_and_unsubscribes() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .bind(surface.clone(), stream, Lifecycle::new())
        .await;
    binding.start_monitoring();
    assert_eq!(surface.subscriber_count(), 1);

    binding.release();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(surface.attached_stream(), None);
    assert_eq!(surface.subscriber_count(), 0);

    let plays = surface.play_calls();
    surface.pause();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(surface.play_calls(), plays);
}

#[tokio::test]
async fn test_unmounted_lifecycle_silences_events() {
    let surface = Arc::new(MockSurface::new());
    let stream = live_stream().await;
    let lifecycle = Lifecycle::new();
    let mut binding = PreviewBinder::new(&CaptureConfig::default())
        .with_clock(Arc::new(StalledClock))
        .bind(surface.clone(), stream, lifecycle.clone())
        .await;
    let mut events = binding.subscribe();
    next(&mut events).await;

    binding.start_monitoring();
    lifecycle.unmount();
    surface.raise_error("late");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(events.try_recv().is_err());
    binding.release();
}
