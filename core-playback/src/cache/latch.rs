//! Countdown latch for aggregating concurrent completions.
//!
//! Initialised to `N`; every completion counts down once and records whether
//! it succeeded. The completion fires exactly once, when the count reaches
//! zero, with `true` only if every completion succeeded. A latch of zero fires
//! immediately.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

struct LatchState {
    remaining: usize,
    all_succeeded: bool,
    done: Option<oneshot::Sender<bool>>,
}

/// Counting side of the latch. Clone it into each task.
#[derive(Clone)]
pub struct CountdownLatch {
    state: Arc<Mutex<LatchState>>,
}

/// Waiting side of the latch.
pub struct LatchCompletion {
    receiver: oneshot::Receiver<bool>,
}

impl CountdownLatch {
    pub fn new(count: usize) -> (Self, LatchCompletion) {
        let (tx, rx) = oneshot::channel();

        let mut state = LatchState {
            remaining: count,
            all_succeeded: true,
            done: Some(tx),
        };

        if count == 0 {
            if let Some(tx) = state.done.take() {
                let _ = tx.send(true);
            }
        }

        (
            Self {
                state: Arc::new(Mutex::new(state)),
            },
            LatchCompletion { receiver: rx },
        )
    }

    /// Record one completion. Returns `true` for the call that fired the
    /// latch; calls after that are ignored.
    pub fn count_down(&self, succeeded: bool) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.remaining == 0 {
            return false;
        }

        state.all_succeeded &= succeeded;
        state.remaining -= 1;

        if state.remaining > 0 {
            return false;
        }

        let all_succeeded = state.all_succeeded;
        match state.done.take() {
            Some(tx) => {
                let _ = tx.send(all_succeeded);
                true
            }
            None => false,
        }
    }

    pub fn remaining(&self) -> usize {
        match self.state.lock() {
            Ok(state) => state.remaining,
            Err(poisoned) => poisoned.into_inner().remaining,
        }
    }
}

impl LatchCompletion {
    /// Wait for the final completion. Returns the aggregate success flag.
    ///
    /// If every latch handle is dropped before the count reaches zero the
    /// outcome is reported as a failure.
    pub async fn wait(self) -> bool {
        self.receiver.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_latch_fires_immediately() {
        let (latch, completion) = CountdownLatch::new(0);
        assert!(completion.wait().await);
        assert!(!latch.count_down(false));
    }

    #[tokio::test]
    async fn test_fires_once_after_last() {
        let (latch, completion) = CountdownLatch::new(3);

        assert!(!latch.count_down(true));
        assert!(!latch.count_down(true));
        assert_eq!(latch.remaining(), 1);
        assert!(latch.count_down(true));
        assert!(!latch.count_down(true));

        assert!(completion.wait().await);
    }

    #[tokio::test]
    async fn test_one_failure_fails_aggregate() {
        let (latch, completion) = CountdownLatch::new(2);
        latch.count_down(false);
        latch.count_down(true);
        assert!(!completion.wait().await);
    }

    #[tokio::test]
    async fn test_out_of_order_completions() {
        let n = 8;
        let (latch, completion) = CountdownLatch::new(n);
        let mut handles = Vec::new();

        // Later tasks finish first
        for i in 0..n {
            let latch = latch.clone();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(((n - i) * 5) as u64)).await;
                latch.count_down(i != 3)
            }));
        }

        let mut fired = 0;
        for handle in handles {
            if handle.await.unwrap() {
                fired += 1;
            }
        }

        assert_eq!(fired, 1);
        assert!(!completion.wait().await);
    }

    #[tokio::test]
    async fn test_dropped_latch_reports_failure() {
        let (latch, completion) = CountdownLatch::new(2);
        latch.count_down(true);
        drop(latch);
        assert!(!completion.wait().await);
    }
}
