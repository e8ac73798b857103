use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::trace;

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Cancellable delayed action: only the last scheduled action runs, once the
/// input has been idle for `delay`.
///
/// Cancelling only affects an action that is still waiting; one that already
/// started runs to completion. Dropping the debouncer cancels the pending
/// action.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<oneshot::Sender<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending action with `action`, restarting the delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let (tx, rx) = oneshot::channel::<()>();
        let delay = self.delay;
        tokio::spawn(async move {
            let elapsed = tokio::select! {
                biased;
                _ = rx => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if elapsed {
                action.await;
            } else {
                trace!("debounced action superseded");
            }
        });
        self.pending = Some(tx);
    }

    /// Drop the pending action, if it has not started yet.
    pub fn cancel(&mut self) {
        // Dropping the sender wakes the waiting task.
        self.pending.take();
    }

    /// Whether an action is still waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
