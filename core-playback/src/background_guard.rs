//! Background execution guard.
//!
//! Keeps the device awake while audio plays and holds at most one
//! extended-execution grant while the app is in the background.

use crate::engine::PlaybackSnapshot;
use bridge_traits::{BackgroundTaskHost, GrantId, IdleTimer, LifecycleState};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const GRANT_REASON: &str = "Meditation audio playback";

pub struct BackgroundGuard {
    idle_timer: Option<Arc<dyn IdleTimer>>,
    host: Option<Arc<dyn BackgroundTaskHost>>,
    grant: Mutex<Option<GrantId>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundGuard {
    pub fn new(
        idle_timer: Option<Arc<dyn IdleTimer>>,
        host: Option<Arc<dyn BackgroundTaskHost>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            idle_timer,
            host,
            grant: Mutex::new(None),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Disable idle sleep while playing, re-enable it otherwise.
    pub async fn on_playing_changed(&self, playing: bool) {
        let Some(timer) = &self.idle_timer else {
            return;
        };
        match timer.set_idle_timer_disabled(playing).await {
            Ok(()) => debug!(idle_sleep_disabled = playing, "Idle timer updated"),
            Err(e) => warn!(error = %e, "Failed to update idle timer"),
        }
    }

    /// Request a grant when backgrounded, release it in the foreground.
    ///
    /// Any previous grant is released before a new one is requested.
    pub async fn on_lifecycle(&self, state: LifecycleState) {
        let Some(host) = &self.host else {
            return;
        };
        let mut grant = self.grant.lock().await;

        if let Some(previous) = grant.take() {
            if let Err(e) = host.end_extended_execution(previous).await {
                warn!(error = %e, "Failed to release extended execution");
            }
            debug!(grant = ?previous, "Extended execution released");
        }

        match state {
            LifecycleState::Background | LifecycleState::Suspended => {
                match host.begin_extended_execution(GRANT_REASON).await {
                    Ok(id) => {
                        info!(grant = ?id, "Extended execution granted");
                        *grant = Some(id);
                    }
                    Err(e) => warn!(error = %e, "Extended execution refused"),
                }
            }
            LifecycleState::Foreground => {}
        }
    }

    /// The host revoked `id`; forget it if it is the one we hold.
    pub async fn on_grant_revoked(&self, id: GrantId) {
        let mut grant = self.grant.lock().await;
        if *grant == Some(id) {
            info!(grant = ?id, "Extended execution revoked");
            *grant = None;
        }
    }

    pub async fn current_grant(&self) -> Option<GrantId> {
        *self.grant.lock().await
    }

    pub async fn has_grant(&self) -> bool {
        self.current_grant().await.is_some()
    }

    /// Follow the engine's playing flag.
    pub async fn watch_playback(self: &Arc<Self>, mut snapshots: watch::Receiver<PlaybackSnapshot>) {
        let guard = Arc::clone(self);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut last: Option<bool> = None;
            loop {
                let playing = snapshots.borrow_and_update().is_playing();
                if last != Some(playing) {
                    guard.on_playing_changed(playing).await;
                    last = Some(playing);
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    /// Follow grant revocations from the host.
    pub async fn watch_revocations(self: &Arc<Self>) {
        let Some(host) = self.host.clone() else {
            return;
        };
        let mut stream = match host.subscribe_revocations().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Grant revocations unavailable");
                return;
            }
        };

        let guard = Arc::clone(self);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    revoked = stream.next() => match revoked {
                        Some(id) => guard.on_grant_revoked(id).await,
                        None => break,
                    },
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }

    /// Stop watchers, release the grant and re-enable idle sleep.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for task in self.tasks.lock().await.drain(..) {
            let _ = task.await;
        }
        self.on_lifecycle(LifecycleState::Foreground).await;
        self.on_playing_changed(false).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::{DesktopBackgroundTaskHost, DesktopIdleTimer};
    use bridge_traits::error::{BridgeError, Result};
    use bridge_traits::GrantRevocationStream;
    use mockall::{mock, predicate::eq};

    mock! {
        Host {}

        #[async_trait]
        impl BackgroundTaskHost for Host {
            async fn begin_extended_execution(&self, reason: &str) -> Result<GrantId>;
            async fn end_extended_execution(&self, grant: GrantId) -> Result<()>;
            async fn subscribe_revocations(&self) -> Result<Box<dyn GrantRevocationStream>>;
        }
    }

    #[tokio::test]
    async fn test_idle_timer_follows_playing() {
        let timer = Arc::new(DesktopIdleTimer::new());
        let guard = BackgroundGuard::new(Some(timer.clone()), None);

        guard.on_playing_changed(true).await;
        assert!(timer.is_disabled());
        guard.on_playing_changed(false).await;
        assert!(!timer.is_disabled());
    }

    #[tokio::test]
    async fn test_never_holds_two_grants() {
        let host = Arc::new(DesktopBackgroundTaskHost::new());
        let guard = BackgroundGuard::new(None, Some(host.clone()));

        guard.on_lifecycle(LifecycleState::Background).await;
        let first = guard.current_grant().await.unwrap();
        guard.on_lifecycle(LifecycleState::Suspended).await;
        let second = guard.current_grant().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(host.active_grants().await, 1);

        guard.on_lifecycle(LifecycleState::Foreground).await;
        assert!(!guard.has_grant().await);
        assert_eq!(host.active_grants().await, 0);
    }

    #[tokio::test]
    async fn test_revoked_grant_is_forgotten() {
        let host = Arc::new(DesktopBackgroundTaskHost::new());
        let guard = BackgroundGuard::new(None, Some(host.clone()));
        guard.watch_revocations().await;

        guard.on_lifecycle(LifecycleState::Background).await;
        let grant = guard.current_grant().await.unwrap();
        host.revoke(grant).await;

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while guard.has_grant().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        guard.shutdown().await;
    }

    #[tokio::test]
    async fn test_refused_grant_leaves_none() {
        let mut host = MockHost::new();
        host.expect_begin_extended_execution()
            .times(1)
            .returning(|_| Err(BridgeError::NotAvailable("budget exhausted".to_string())));
        host.expect_end_extended_execution().never();

        let guard = BackgroundGuard::new(None, Some(Arc::new(host)));
        guard.on_lifecycle(LifecycleState::Background).await;
        assert!(!guard.has_grant().await);
    }

    #[tokio::test]
    async fn test_prior_grant_released_first() {
        let first = GrantId::new();
        let second = GrantId::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut host = MockHost::new();
        let issued = Arc::new(std::sync::Mutex::new(vec![second, first]));
        let begin_log = log.clone();
        host.expect_begin_extended_execution()
            .times(2)
            .returning(move |_| {
                let id = issued.lock().unwrap().pop().unwrap();
                begin_log.lock().unwrap().push(format!("begin {}", id));
                Ok(id)
            });
        let end_log = log.clone();
        host.expect_end_extended_execution()
            .with(eq(first))
            .times(1)
            .returning(move |id| {
                end_log.lock().unwrap().push(format!("end {}", id));
                Ok(())
            });

        let guard = BackgroundGuard::new(None, Some(Arc::new(host)));
        guard.on_lifecycle(LifecycleState::Background).await;
        guard.on_lifecycle(LifecycleState::Background).await;

        assert_eq!(guard.current_grant().await, Some(second));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                format!("begin {}", first),
                format!("end {}", first),
                format!("begin {}", second),
            ]
        );
    }
}
