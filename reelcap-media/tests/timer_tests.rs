//! Tests for the recording timer

use reelcap_core::{CaptureConfig, Lifecycle};
use reelcap_media::*;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_timer_ticks_once_per_second_until_cap() {
    let timer = RecordingTimer::new(&CaptureConfig::default());
    let started = Instant::now();
    let mut handle = timer.start(Lifecycle::new());

    let mut ticks = 0;
    let mut warning_at = None;
    loop {
        match handle.recv().await.expect("timer event") {
            TimerEvent::Tick { elapsed } => {
                ticks += 1;
                assert_eq!(elapsed, ticks);
                assert_eq!(started.elapsed(), Duration::from_secs(u64::from(elapsed)));
            }
            TimerEvent::Warning { elapsed, remaining } => {
                assert_eq!(remaining, 30);
                warning_at = Some(elapsed);
            }
            TimerEvent::CapReached { elapsed } => {
                assert_eq!(elapsed, 120);
                assert_eq!(started.elapsed(), Duration::from_secs(120));
                break;
            }
        }
    }

    assert_eq!(ticks, 120);
    assert_eq!(warning_at, Some(90));
    assert_eq!(handle.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_cap_not_reported_early() {
    let timer = RecordingTimer::new(&CaptureConfig::default());
    let mut handle = timer.start(Lifecycle::new());

    tokio::time::sleep(Duration::from_millis(119_500)).await;
    let mut seen = Vec::new();
    while let Some(event) = handle.try_recv() {
        seen.push(event);
    }

    assert!(!seen
        .iter()
        .any(|e| matches!(e, TimerEvent::CapReached { .. })));
    assert_eq!(seen.last(), Some(&TimerEvent::Tick { elapsed: 119 }));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_goes_quiet() {
    let timer = RecordingTimer::new(&CaptureConfig::default());
    let mut handle = timer.start(Lifecycle::new());

    assert_eq!(handle.recv().await, Some(TimerEvent::Tick { elapsed: 1 }));
    handle.cancel();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_unmounted_timer_stops() {
    let timer = RecordingTimer::new(&CaptureConfig::default());
    let lifecycle = Lifecycle::new();
    let mut handle = timer.start(lifecycle.clone());

    lifecycle.unmount();
    assert_eq!(handle.recv().await, None);
}

#[test]
fn test_thresholds_come_from_whole_seconds() {
    let config = CaptureConfig {
        duration_warning: Duration::from_secs(45),
        max_duration: Duration::from_secs(60),
        ..CaptureConfig::default()
    };
    let timer = RecordingTimer::new(&config);
    assert_eq!(timer.cap_seconds(), 60);
    assert!(!timer.is_warning(44));
    assert!(timer.is_warning(45));

    let huge = CaptureConfig {
        max_duration: Duration::from_secs(u64::MAX),
        ..CaptureConfig::default()
    };
    assert_eq!(RecordingTimer::new(&huge).cap_seconds(), u32::MAX);
}

