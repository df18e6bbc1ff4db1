//! Lifecycle, extended execution and idle-timer bridges for desktop.

use async_trait::async_trait;
use bridge_traits::{
    background::{
        BackgroundTaskHost, GrantId, GrantRevocationStream, IdleTimer, LifecycleChangeStream,
        LifecycleObserver, LifecycleState,
    },
    error::{BridgeError, Result},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 16;

/// Desktop lifecycle observer.
///
/// Desktop apps are foreground by default. Window toolkits that can observe
/// minimise/restore call [`set_state`](Self::set_state) to forward those
/// transitions.
pub struct DesktopLifecycleObserver {
    state: RwLock<LifecycleState>,
    sender: broadcast::Sender<LifecycleState>,
}

impl DesktopLifecycleObserver {
    /// Create a new lifecycle observer in the foreground state.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(LifecycleState::Foreground),
            sender,
        }
    }

    /// Record a transition and notify subscribers. Repeated states are ignored.
    pub async fn set_state(&self, state: LifecycleState) {
        let mut current = self.state.write().await;
        if *current == state {
            return;
        }
        debug!(from = ?*current, to = ?state, "Lifecycle transition");
        *current = state;
        // No subscribers is fine
        let _ = self.sender.send(state);
    }
}

impl Default for DesktopLifecycleObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleObserver for DesktopLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(*self.state.read().await)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(DesktopLifecycleChangeStream {
            receiver: self.sender.subscribe(),
        }))
    }
}

struct DesktopLifecycleChangeStream {
    receiver: broadcast::Receiver<LifecycleState>,
}

#[async_trait]
impl LifecycleChangeStream for DesktopLifecycleChangeStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        loop {
            match self.receiver.recv().await {
                Ok(state) => return Some(state),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Lifecycle subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process extended-execution host.
///
/// Desktop processes are not suspended, so grants are bookkeeping. An
/// optional expiry mimics mobile time limits: when it elapses the grant is
/// revoked and announced on the revocation stream.
pub struct DesktopBackgroundTaskHost {
    grants: Arc<RwLock<HashMap<GrantId, Instant>>>,
    revocations: broadcast::Sender<GrantId>,
    expiry: Option<Duration>,
}

impl DesktopBackgroundTaskHost {
    pub fn new() -> Self {
        let (revocations, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            grants: Arc::new(RwLock::new(HashMap::new())),
            revocations,
            expiry: None,
        }
    }

    /// Revoke grants automatically after `expiry`.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Number of grants currently outstanding.
    pub async fn active_grants(&self) -> usize {
        self.grants.read().await.len()
    }

    /// Revoke a grant as the OS would when its time budget runs out.
    pub async fn revoke(&self, grant: GrantId) {
        Self::revoke_inner(&self.grants, &self.revocations, grant).await;
    }

    async fn revoke_inner(
        grants: &RwLock<HashMap<GrantId, Instant>>,
        revocations: &broadcast::Sender<GrantId>,
        grant: GrantId,
    ) {
        if let Some(started) = grants.write().await.remove(&grant) {
            info!(grant = %grant, held_ms = started.elapsed().as_millis() as u64, "Extended execution revoked");
            let _ = revocations.send(grant);
        }
    }
}

impl Default for DesktopBackgroundTaskHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundTaskHost for DesktopBackgroundTaskHost {
    async fn begin_extended_execution(&self, reason: &str) -> Result<GrantId> {
        let grant = GrantId::new();
        self.grants.write().await.insert(grant, Instant::now());
        debug!(grant = %grant, reason, "Extended execution granted");

        if let Some(expiry) = self.expiry {
            let grants = Arc::clone(&self.grants);
            let revocations = self.revocations.clone();
            tokio::spawn(async move {
                tokio::time::sleep(expiry).await;
                Self::revoke_inner(&grants, &revocations, grant).await;
            });
        }

        Ok(grant)
    }

    async fn end_extended_execution(&self, grant: GrantId) -> Result<()> {
        if self.grants.write().await.remove(&grant).is_some() {
            debug!(grant = %grant, "Extended execution ended");
        }
        Ok(())
    }

    async fn subscribe_revocations(&self) -> Result<Box<dyn GrantRevocationStream>> {
        Ok(Box::new(DesktopRevocationStream {
            receiver: self.revocations.subscribe(),
        }))
    }
}

struct DesktopRevocationStream {
    receiver: broadcast::Receiver<GrantId>,
}

#[async_trait]
impl GrantRevocationStream for DesktopRevocationStream {
    async fn next(&mut self) -> Option<GrantId> {
        loop {
            match self.receiver.recv().await {
                Ok(grant) => return Some(grant),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Revocation subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Idle timer for desktop.
///
/// There is no portable screensaver inhibit API, so this records the
/// requested state for the host UI to act on.
#[derive(Debug, Default)]
pub struct DesktopIdleTimer {
    disabled: AtomicBool,
}

impl DesktopIdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the core currently asks to keep the display awake.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdleTimer for DesktopIdleTimer {
    async fn set_idle_timer_disabled(&self, disabled: bool) -> Result<()> {
        let previous = self.disabled.swap(disabled, Ordering::SeqCst);
        if previous != disabled {
            debug!(disabled, "Idle timer state changed");
        }
        Ok(())
    }
}

/// Idle timer that refuses every request, for hosts without the capability.
#[derive(Debug, Default)]
pub struct UnsupportedIdleTimer;

#[async_trait]
impl IdleTimer for UnsupportedIdleTimer {
    async fn set_idle_timer_disabled(&self, _disabled: bool) -> Result<()> {
        Err(BridgeError::NotAvailable(
            "Idle timer control is not supported on this host".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_observer_defaults_to_foreground() {
        let observer = DesktopLifecycleObserver::new();
        assert_eq!(
            observer.get_state().await.unwrap(),
            LifecycleState::Foreground
        );
    }

    #[tokio::test]
    async fn test_lifecycle_transitions_reach_subscribers() {
        let observer = DesktopLifecycleObserver::new();
        let mut stream = observer.subscribe_changes().await.unwrap();

        observer.set_state(LifecycleState::Background).await;
        observer.set_state(LifecycleState::Background).await;
        observer.set_state(LifecycleState::Foreground).await;

        assert_eq!(stream.next().await, Some(LifecycleState::Background));
        assert_eq!(stream.next().await, Some(LifecycleState::Foreground));
    }

    #[tokio::test]
    async fn test_grants_begin_and_end() {
        let host = DesktopBackgroundTaskHost::new();

        let grant = host.begin_extended_execution("audio").await.unwrap();
        assert_eq!(host.active_grants().await, 1);

        host.end_extended_execution(grant).await.unwrap();
        assert_eq!(host.active_grants().await, 0);

        // Ending twice is harmless
        host.end_extended_execution(grant).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_grant_is_revoked() {
        let host = DesktopBackgroundTaskHost::new().with_expiry(Duration::from_millis(20));
        let mut revocations = host.subscribe_revocations().await.unwrap();

        let grant = host.begin_extended_execution("audio").await.unwrap();

        let revoked = tokio::time::timeout(Duration::from_secs(2), revocations.next())
            .await
            .unwrap();
        assert_eq!(revoked, Some(grant));
        assert_eq!(host.active_grants().await, 0);
    }

    #[tokio::test]
    async fn test_idle_timer_tracks_state() {
        let timer = DesktopIdleTimer::new();
        assert!(!timer.is_disabled());

        timer.set_idle_timer_disabled(true).await.unwrap();
        assert!(timer.is_disabled());

        timer.set_idle_timer_disabled(false).await.unwrap();
        assert!(!timer.is_disabled());
    }

    #[tokio::test]
    async fn test_unsupported_idle_timer_errors() {
        let timer = UnsupportedIdleTimer;
        assert!(timer.set_idle_timer_disabled(true).await.is_err());
    }
}
