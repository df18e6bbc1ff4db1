//! Connectivity observer.
//!
//! Publishes reachability as a `tokio::sync::watch` value that any component
//! can subscribe to, and announces transitions on the [`EventBus`].
//!
//! Without a [`NetworkMonitor`] the observer starts online and only changes
//! when the host calls [`ConnectivityObserver::set_connected`].

use crate::events::{ConnectivityEvent, CoreEvent, EventBus};
use bridge_traits::NetworkMonitor;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ConnectivityObserver {
    monitor: Option<Arc<dyn NetworkMonitor>>,
    event_bus: EventBus,
    state: watch::Sender<bool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityObserver {
    pub fn new(monitor: Option<Arc<dyn NetworkMonitor>>, event_bus: EventBus) -> Self {
        let (state, _) = watch::channel(true);
        Self {
            monitor,
            event_bus,
            state,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Current reachability.
    pub fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    /// Stream of connectivity values. The receiver sees the current value
    /// immediately and every change after it.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Record a reachability value. Repeats are ignored.
    pub fn set_connected(&self, connected: bool) {
        publish(&self.state, &self.event_bus, connected);
    }

    /// Read the initial status and follow the monitor's change stream.
    ///
    /// Calling `start` again while already running does nothing.
    pub async fn start(&self) {
        let Some(monitor) = self.monitor.clone() else {
            debug!("No network monitor; assuming online");
            return;
        };

        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        match monitor.get_network_info().await {
            Ok(info) => self.set_connected(info.is_connected()),
            Err(e) => warn!(error = %e, "Initial network status unavailable; assuming online"),
        }

        let mut changes = match monitor.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Network change stream unavailable");
                return;
            }
        };

        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let cancel = self.cancel.clone();

        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = changes.next() => match next {
                        Some(info) => publish(&state, &event_bus, info.is_connected()),
                        None => {
                            debug!("Network change stream ended");
                            break;
                        }
                    },
                }
            }
        }));
    }

    /// Stop following the monitor.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

fn publish(state: &watch::Sender<bool>, event_bus: &EventBus, connected: bool) {
    let changed = state.send_if_modified(|current| {
        if *current == connected {
            false
        } else {
            *current = connected;
            true
        }
    });

    if !changed {
        return;
    }

    let event = if connected {
        info!("Network restored");
        ConnectivityEvent::CameOnline
    } else {
        info!("Network lost");
        ConnectivityEvent::WentOffline
    };
    let _ = event_bus.emit(CoreEvent::Connectivity(event));
}
