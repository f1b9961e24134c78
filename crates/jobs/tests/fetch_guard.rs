//! Stale-response handling with `FetchGuard`, modelled on a studio page
//! that re-fetches its session whenever the selected mode changes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pstudio_jobs::FetchGuard;

/// What the page currently shows.
#[derive(Debug, Default, Clone, PartialEq)]
struct SessionView {
    mode: String,
    frames: Vec<String>,
}

async fn fetch_session(mode: &str, latency: Duration) -> Vec<String> {
    tokio::time::sleep(latency).await;
    vec![format!("{mode}-frame-1")]
}

// ---------------------------------------------------------------------------
// Test: an older response arriving last does not overwrite the newer mode
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_response_for_previous_mode_is_discarded() {
    let guard = Arc::new(FetchGuard::new());
    let view = Arc::new(Mutex::new(SessionView::default()));

    let load = |mode: &'static str, latency: Duration| {
        let guard = guard.clone();
        let view = view.clone();
        async move {
            view.lock().unwrap().mode = mode.to_string();
            if let Some(frames) = guard.guard(fetch_session(mode, latency)).await {
                view.lock().unwrap().frames = frames;
            }
        }
    };

    let torso = tokio::spawn(load("TORSO", Duration::from_secs(3)));
    tokio::task::yield_now().await;
    let legs = tokio::spawn(load("LEGS", Duration::from_secs(1)));

    legs.await.unwrap();
    torso.await.unwrap();

    let view = view.lock().unwrap().clone();
    assert_eq!(view.mode, "LEGS");
    assert_eq!(view.frames, vec!["LEGS-frame-1".to_string()]);
}

// ---------------------------------------------------------------------------
// Test: issue order, not completion order, decides staleness
// ---------------------------------------------------------------------------

#[test]
fn latest_issued_generation_wins() {
    let guard = FetchGuard::new();
    let g1 = guard.issue();
    let g2 = guard.issue();

    // g2 completes first and is applied.
    assert!(guard.is_current(g2));
    // g1 completes later and is discarded.
    assert!(!guard.is_current(g1));
}
