use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::ServiceReconciler;
use crate::utils::log_throttle;

const FOCUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Why the connected-service list should be reloaded.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshSignal {
    InitialMount,
    WizardCompleted,
    /// The user came back to the window, possibly after connecting in another tab.
    WindowFocus,
}

/// Anything that can deliver refresh signals: focus polling today, a push channel later.
#[async_trait]
pub trait RefreshSource: Send {
    /// `None` once the source is closed.
    async fn next_signal(&mut self) -> Option<RefreshSignal>;
}

/// Cloneable sender side of a [`ChannelRefreshSource`].
#[derive(Clone, Debug)]
pub struct RefreshHandle {
    tx: mpsc::UnboundedSender<RefreshSignal>,
}

impl RefreshHandle {
    /// Best effort; a closed loop just means nobody is listening any more.
    pub fn signal(&self, signal: RefreshSignal) {
        if self.tx.send(signal).is_err() {
            debug!(
                event_name = "reconciler.signal_dropped",
                event_domain = "reconciler",
                ?signal,
                "Refresh loop is gone; dropping signal"
            );
        }
    }
}

pub struct ChannelRefreshSource {
    rx: mpsc::UnboundedReceiver<RefreshSignal>,
}

impl ChannelRefreshSource {
    pub fn new() -> (RefreshHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RefreshHandle { tx }, ChannelRefreshSource { rx })
    }
}

#[async_trait]
impl RefreshSource for ChannelRefreshSource {
    async fn next_signal(&mut self) -> Option<RefreshSignal> {
        self.rx.recv().await
    }
}

/// Write the "refresh requested" line, throttled for focus events.
pub(crate) fn log_signal(signal: RefreshSignal) {
    if signal == RefreshSignal::WindowFocus {
        if let Some(suppressed) = log_throttle::should_emit("reconciler.focus", FOCUS_LOG_INTERVAL)
        {
            info!(
                event_name = "reconciler.refresh_requested",
                event_domain = "reconciler",
                ?signal,
                suppressed,
                "Refreshing connected services on window focus"
            );
        }
        return;
    }
    info!(
        event_name = "reconciler.refresh_requested",
        event_domain = "reconciler",
        ?signal,
        "Refreshing connected services"
    );
}

/// Drain a source into the reconciler until it closes.
pub async fn run_refresh_loop<S: RefreshSource>(mut source: S, reconciler: Arc<ServiceReconciler>) {
    while let Some(signal) = source.next_signal().await {
        reconciler.handle_signal(signal).await;
    }
    debug!(
        event_name = "reconciler.loop_closed",
        event_domain = "reconciler",
        "Refresh source closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_delivers_in_order_and_closes() {
        let (handle, mut source) = ChannelRefreshSource::new();
        handle.signal(RefreshSignal::InitialMount);
        handle.signal(RefreshSignal::WindowFocus);
        drop(handle);

        assert_eq!(source.next_signal().await, Some(RefreshSignal::InitialMount));
        assert_eq!(source.next_signal().await, Some(RefreshSignal::WindowFocus));
        assert_eq!(source.next_signal().await, None);
    }

    #[test]
    fn signals_use_snake_case_on_the_wire() {
        let signal: RefreshSignal = serde_json::from_str(r#""wizard_completed""#).unwrap();
        assert_eq!(signal, RefreshSignal::WizardCompleted);
    }
}
