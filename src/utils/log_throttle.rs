use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    suppressed: u64,
}

static WINDOWS: OnceLock<Mutex<HashMap<String, Window>>> = OnceLock::new();

/// Rate-limit a noisy log line such as the per-focus refresh message.
///
/// Returns `Some(suppressed)` when the line for `key` should be written, where
/// `suppressed` is how many were swallowed since the last write, or `None`
/// when it falls inside the current window.
pub fn should_emit(key: &str, interval: Duration) -> Option<u64> {
    let windows = WINDOWS.get_or_init(|| Mutex::new(HashMap::new()));
    // A poisoned throttle only means a panic elsewhere while logging; keep counting.
    let mut windows = windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let now = Instant::now();

    let Some(window) = windows.get_mut(key) else {
        windows.insert(
            key.to_string(),
            Window {
                opened_at: now,
                suppressed: 0,
            },
        );
        return Some(0);
    };
    if now.duration_since(window.opened_at) < interval {
        window.suppressed += 1;
        return None;
    }
    let suppressed = window.suppressed;
    window.opened_at = now;
    window.suppressed = 0;
    Some(suppressed)
}
