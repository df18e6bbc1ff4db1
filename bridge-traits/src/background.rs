//! Background Execution and App Lifecycle
//!
//! Traits for observing foreground/background transitions, requesting
//! extended execution time while backgrounded, and keeping the device awake
//! during playback.

use std::fmt;

use uuid::Uuid;

use crate::error::Result;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Application is in the foreground and active
    Foreground,
    /// Application is in the background
    Background,
    /// Application is being suspended
    Suspended,
}

/// Lifecycle observer trait
///
/// Notifies the core about app lifecycle transitions so it can:
/// - Request extended execution when backgrounded
/// - Persist the playback position before suspension
/// - Release grants when foregrounded
///
/// # Platform Support
///
/// - **iOS**: UIApplication lifecycle notifications
/// - **Android**: Activity/Application lifecycle callbacks
/// - **Desktop**: Window focus/minimize events (less critical)
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{LifecycleObserver, LifecycleState};
///
/// async fn setup_lifecycle(observer: &dyn LifecycleObserver) -> Result<()> {
///     let mut stream = observer.subscribe_changes().await?;
///
///     while let Some(state) = stream.next().await {
///         match state {
///             LifecycleState::Background => request_grant(),
///             LifecycleState::Foreground => release_grant(),
///             _ => {}
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait::async_trait]
pub trait LifecycleChangeStream: Send {
    /// Get the next lifecycle state update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}

/// Identifier of an extended-execution grant handed out by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantId(Uuid);

impl GrantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extended background execution
///
/// - **iOS**: `beginBackgroundTask` / `endBackgroundTask`
/// - **Android**: foreground service start/stop
/// - **Desktop**: no OS limit, grants are bookkeeping only
///
/// A grant may be revoked by the host before it is ended (for example when
/// the OS expiration handler fires). Revocations are delivered through
/// [`subscribe_revocations`](BackgroundTaskHost::subscribe_revocations).
#[async_trait::async_trait]
pub trait BackgroundTaskHost: Send + Sync {
    /// Request extended execution time
    async fn begin_extended_execution(&self, reason: &str) -> Result<GrantId>;

    /// Release a previously granted extension
    ///
    /// Ending an unknown or already revoked grant is not an error.
    async fn end_extended_execution(&self, grant: GrantId) -> Result<()>;

    /// Subscribe to grants revoked by the host
    async fn subscribe_revocations(&self) -> Result<Box<dyn GrantRevocationStream>>;
}

/// Stream of revoked grants
#[async_trait::async_trait]
pub trait GrantRevocationStream: Send {
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<GrantId>;
}

/// Idle-sleep control (keep the screen/session awake)
#[async_trait::async_trait]
pub trait IdleTimer: Send + Sync {
    /// `true` keeps the device awake, `false` restores the OS default.
    async fn set_idle_timer_disabled(&self, disabled: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_ids_are_unique() {
        let a = GrantId::new();
        let b = GrantId::new();

        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }
}
