//! One-shot deletion timers on the tokio runtime.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tokio::time::Instant;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Identifier of a timer, unique per [`DeletionTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Result of cancelling a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The timer was pending and will never fire.
    WasPending,
    /// The timer had already fired; its action is running or has run.
    AlreadyFired,
    /// The timer had been cancelled before.
    AlreadyCancelled,
}

/// Issues one-shot timers. Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct DeletionTimer {
    next_id: AtomicU64,
}

impl DeletionTimer {
    /// Create a timer service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` once at `deadline` unless the returned handle is
    /// cancelled first. The action receives the id of its own timer.
    pub fn schedule_once<F, Fut>(&self, deadline: Instant, action: F) -> TimerHandle
    where
        F: FnOnce(TimerId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(AtomicU8::new(PENDING));

        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if task_state
                .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                action(id).await;
            }
        });

        TimerHandle {
            id,
            deadline,
            state,
            task,
        }
    }
}

/// Cancelable handle to a scheduled one-shot action.
///
/// Dropping the handle does not cancel the timer.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    deadline: Instant,
    state: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the timer has neither fired nor been cancelled.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Cancel the timer. Idempotent.
    pub fn cancel(&self) -> CancelOutcome {
        match self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                // Not started yet, so aborting cannot interrupt the action.
                self.task.abort();
                CancelOutcome::WasPending
            }
            Err(FIRED) => CancelOutcome::AlreadyFired,
            Err(_) => CancelOutcome::AlreadyCancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_action(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce(TimerId) -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_deadline() {
        let timer = DeletionTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = timer.schedule_once(
            Instant::now() + Duration::from_secs(2),
            counting_action(&fired),
        );

        tokio::time::sleep(Duration::from_millis(1_999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(handle.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!handle.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_outcomes() {
        let timer = DeletionTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = timer.schedule_once(
            Instant::now() + Duration::from_secs(1),
            counting_action(&fired),
        );

        assert_eq!(handle.cancel(), CancelOutcome::WasPending);
        assert_eq!(handle.cancel(), CancelOutcome::AlreadyCancelled);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_reports_race() {
        let timer = DeletionTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = timer.schedule_once(
            Instant::now() + Duration::from_secs(1),
            counting_action(&fired),
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.cancel(), CancelOutcome::AlreadyFired);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let timer = DeletionTimer::new();
        let deadline = Instant::now() + Duration::from_secs(60);
        let a = timer.schedule_once(deadline, |_| async {});
        let b = timer.schedule_once(deadline, |_| async {});
        assert_ne!(a.id(), b.id());
        a.cancel();
        b.cancel();
    }
}
