use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Trailing debounce. Each scheduled task waits out the quiet window and
/// only runs if nothing was scheduled after it in the meantime.
///
/// Once a task has started running it is no longer cancellable.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    /// Replace whatever is waiting with `task` and restart the window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.swap_pending(Some(token.clone())) {
            previous.cancel();
        }

        let window = self.window;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(window) => task.await,
            }
        });
    }

    /// Drop the waiting task, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.swap_pending(None) {
            previous.cancel();
        }
    }

    fn swap_pending(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pending, next)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    async fn store(counter: Arc<AtomicUsize>, value: usize) {
        counter.store(value, Ordering::SeqCst);
    }

    #[tokio::test(start_paused = true)]
    async fn only_last_task_of_burst_runs() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let last = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        for i in 1..=5 {
            let runs = Arc::clone(&runs);
            let last = Arc::clone(&last);
            debouncer.schedule(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                last.store(i, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn task_waits_for_full_window() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let value = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(store(Arc::clone(&value), 7));

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(value.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(value.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_waiting_task() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let value = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(store(Arc::clone(&value), 1));
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(value.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_each_fire() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = Arc::clone(&runs);
            debouncer.schedule(async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(400)).await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
