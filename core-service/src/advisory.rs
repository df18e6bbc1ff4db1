//! Offline advisory banner state.
//!
//! Follows connectivity: going offline shows the advisory for a fixed time,
//! coming back online hides it at once. The host renders whatever
//! [`OfflineAdvisory::subscribe`] currently holds.

use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const OFFLINE_MESSAGE: &str = "You are currently offline. Using cached content.";

pub struct OfflineAdvisory {
    visible_for: Duration,
    event_bus: EventBus,
    state: watch::Sender<Option<String>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OfflineAdvisory {
    pub fn new(visible_for: Duration, event_bus: EventBus) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            visible_for,
            event_bus,
            state,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Advisory text while visible, `None` otherwise.
    pub fn current(&self) -> Option<String> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.state.subscribe()
    }

    /// Follow `connectivity` until shutdown.
    pub async fn start(&self, mut connectivity: watch::Receiver<bool>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let visible_for = self.visible_for;
        let cancel = self.cancel.clone();

        *task = Some(tokio::spawn(async move {
            let mut hide_at: Option<Instant> = None;
            let mut last: Option<bool> = None;

            loop {
                let connected = *connectivity.borrow_and_update();
                if last != Some(connected) {
                    if connected {
                        hide_at = None;
                        hide(&state, &event_bus);
                    } else {
                        hide_at = Some(Instant::now() + visible_for);
                        show(&state, &event_bus);
                    }
                    last = Some(connected);
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = wait_until(hide_at) => {
                        hide_at = None;
                        hide(&state, &event_bus);
                    }
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }));
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn show(state: &watch::Sender<Option<String>>, event_bus: &EventBus) {
    state.send_replace(Some(OFFLINE_MESSAGE.to_string()));
    debug!("Offline advisory shown");
    let _ = event_bus.emit(CoreEvent::Connectivity(ConnectivityEvent::AdvisoryShown {
        message: OFFLINE_MESSAGE.to_string(),
    }));
}

fn hide(state: &watch::Sender<Option<String>>, event_bus: &EventBus) {
    let was_visible = state.send_if_modified(|current| current.take().is_some());
    if was_visible {
        debug!("Offline advisory hidden");
        let _ = event_bus.emit(CoreEvent::Connectivity(ConnectivityEvent::AdvisoryHidden));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shown_when_offline_then_auto_hidden() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let (connectivity, rx) = watch::channel(true);
        let advisory = OfflineAdvisory::new(Duration::from_secs(5), bus);
        advisory.start(rx).await;
        settle().await;
        assert!(advisory.current().is_none());

        connectivity.send_replace(false);
        settle().await;
        assert_eq!(advisory.current().as_deref(), Some(OFFLINE_MESSAGE));

        tokio::time::advance(Duration::from_millis(4_900)).await;
        settle().await;
        assert!(advisory.current().is_some());

        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
        assert!(advisory.current().is_none());

        assert!(matches!(
            events.try_recv(),
            Ok(CoreEvent::Connectivity(ConnectivityEvent::AdvisoryShown { .. }))
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(CoreEvent::Connectivity(ConnectivityEvent::AdvisoryHidden))
        ));

        advisory.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_immediately_on_reconnect() {
        let (connectivity, rx) = watch::channel(true);
        let advisory = OfflineAdvisory::new(Duration::from_secs(5), EventBus::new(16));
        advisory.start(rx).await;

        connectivity.send_replace(false);
        settle().await;
        assert!(advisory.current().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        connectivity.send_replace(true);
        settle().await;
        assert!(advisory.current().is_none());

        advisory.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_at_start_shows_advisory() {
        let (_connectivity, rx) = watch::channel(false);
        let advisory = OfflineAdvisory::new(Duration::from_secs(5), EventBus::new(16));
        let mut banner = advisory.subscribe();
        advisory.start(rx).await;

        banner.changed().await.unwrap();
        assert_eq!(banner.borrow().as_deref(), Some(OFFLINE_MESSAGE));

        advisory.shutdown().await;
    }
}
