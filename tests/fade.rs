mod common;

use common::RecordingSink;
use proximity_display::display::LevelBounds;
use proximity_display::fade::{Easing, FadeEngine, FadeOutcome};
use std::time::Duration;
use tokio::time::Instant;

fn engine(sink: &RecordingSink) -> FadeEngine<RecordingSink> {
    FadeEngine::new(sink.clone(), LevelBounds::new(0, 255))
}

fn millis_since(start: Instant, at: Instant) -> u128 {
    at.duration_since(start).as_millis()
}

#[tokio::test(start_paused = true)]
async fn test_linear_four_steps_are_evenly_spaced() {
    let sink = RecordingSink::new();
    let engine = engine(&sink);

    let start = Instant::now();
    let outcome = engine
        .request_fade(255, Duration::from_secs(1), 4, Easing::Linear)
        .wait()
        .await;

    assert_eq!(outcome, FadeOutcome::Completed);
    assert_eq!(sink.levels(), vec![64, 128, 191, 255]);

    let offsets: Vec<u128> = sink
        .writes()
        .iter()
        .map(|w| millis_since(start, w.at))
        .collect();
    for (offset, expected) in offsets.iter().zip([250u128, 500, 750, 1000]) {
        assert!(
            offset.abs_diff(expected) <= 5,
            "write at {offset}ms, expected {expected}ms"
        );
    }
    assert_eq!(engine.current_level(), 255);
    assert!(!engine.state().active);
}

#[tokio::test(start_paused = true)]
async fn test_many_steps_end_exactly_on_target() {
    let sink = RecordingSink::new();
    let engine = engine(&sink);

    let outcome = engine
        .request_fade(255, Duration::from_secs(1), 600, Easing::EaseInOut)
        .wait()
        .await;

    assert_eq!(outcome, FadeOutcome::Completed);
    let levels = sink.levels();
    assert_eq!(levels.last(), Some(&255));
    assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    // Unchanged intermediate levels are not rewritten
    assert!(levels.len() <= 256);
}

#[tokio::test(start_paused = true)]
async fn test_fast_fade_respects_step_rate_cap() {
    let sink = RecordingSink::new();
    let engine = engine(&sink);

    let handle = engine.request_fade(255, Duration::from_millis(100), 600, Easing::Linear);
    assert_eq!(handle.request().steps, 60);
    assert_eq!(handle.wait().await, FadeOutcome::Completed);

    let writes = sink.writes();
    assert_eq!(writes.len(), 60);
    for pair in writes.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= Duration::from_millis(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_new_request_preempts_running_fade() {
    let sink = RecordingSink::new();
    let engine = engine(&sink);

    let up = engine.request_fade(255, Duration::from_secs(10), 600, Easing::Linear);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let switched_at = Instant::now();
    let level_at_switch = engine.current_level();
    assert!(level_at_switch > 0 && level_at_switch < 255);

    let down = engine.request_fade(0, Duration::from_secs(1), 120, Easing::Linear);
    assert_eq!(down.request().from_level, level_at_switch);

    assert_eq!(down.wait().await, FadeOutcome::Completed);
    assert_eq!(up.wait().await, FadeOutcome::Superseded);

    let after: Vec<u32> = sink
        .writes()
        .iter()
        .filter(|w| w.at >= switched_at)
        .map(|w| w.level)
        .collect();
    assert!(!after.is_empty());
    assert!(after.iter().all(|&level| level <= level_at_switch));
    assert!(after.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(sink.last_level(), Some(0));
    assert_eq!(engine.current_level(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_preemption_leaves_no_stale_writes() {
    let sink = RecordingSink::new();
    let engine = engine(&sink);

    let up = engine.request_fade(255, Duration::from_secs(10), 600, Easing::EaseInOut);
    let down = engine.request_fade(0, Duration::from_secs(1), 120, Easing::EaseInOut);

    assert_eq!(down.wait().await, FadeOutcome::Completed);
    assert_eq!(up.wait().await, FadeOutcome::Superseded);

    // Let any stale step timers fire
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(sink.levels(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_does_not_abort_fade() {
    let sink = RecordingSink::new();
    sink.fail_on(128);
    let engine = engine(&sink);

    let outcome = engine
        .request_fade(255, Duration::from_secs(1), 4, Easing::Linear)
        .wait()
        .await;

    assert_eq!(outcome, FadeOutcome::Completed);
    assert_eq!(sink.attempts(), vec![64, 128, 191, 255]);
    assert_eq!(sink.levels(), vec![64, 191, 255]);
    assert_eq!(engine.current_level(), 255);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_writes() {
    let sink = RecordingSink::new();
    let engine = engine(&sink);

    let handle = engine.request_fade(255, Duration::from_secs(4), 4, Easing::Linear);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    engine.cancel();

    assert_eq!(handle.wait().await, FadeOutcome::Superseded);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(sink.levels(), vec![64]);
    assert_eq!(engine.current_level(), 64);
    assert!(!engine.state().active);
}

#[tokio::test(start_paused = true)]
async fn test_target_is_clamped_to_bounds() {
    let sink = RecordingSink::new();
    let engine = FadeEngine::new(sink.clone(), LevelBounds::new(10, 200));

    let handle = engine.request_fade(255, Duration::ZERO, 120, Easing::Linear);
    assert_eq!(handle.request().to_level, 200);
    assert_eq!(handle.wait().await, FadeOutcome::Completed);

    engine
        .request_fade(0, Duration::ZERO, 120, Easing::Linear)
        .wait()
        .await;
    assert_eq!(sink.levels(), vec![200, 10]);
}

#[tokio::test(start_paused = true)]
async fn test_same_level_writes_once() {
    let sink = RecordingSink::new();
    let engine = engine(&sink);

    let outcome = engine
        .request_fade(0, Duration::from_secs(1), 120, Easing::Linear)
        .wait()
        .await;

    assert_eq!(outcome, FadeOutcome::Completed);
    assert_eq!(sink.levels(), vec![0]);
}
