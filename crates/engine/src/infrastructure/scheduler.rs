//! Tokio-backed scheduler implementation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::infrastructure::ports::{ScheduledTask, SchedulerPort, TimerHandle};

/// Runs scheduled tasks on the tokio runtime, mapping host ticks to wall
/// time through a fixed tick duration.
pub struct TokioScheduler {
    tick: Duration,
}

impl TokioScheduler {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }
}

impl SchedulerPort for TokioScheduler {
    fn run_later(&self, delay_ticks: u32, task: ScheduledTask) -> TimerHandle {
        let token = CancellationToken::new();
        let watch = token.clone();
        let delay = self.tick * delay_ticks;
        tokio::spawn(async move {
            tokio::select! {
                _ = watch.cancelled() => {}
                _ = tokio::time::sleep(delay) => task.await,
            }
        });
        TimerHandle::new(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn task_runs_after_delay() {
        let scheduler = TokioScheduler::new(Duration::from_millis(1));
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        scheduler.run_later(
            1,
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_task_never_runs() {
        let scheduler = TokioScheduler::new(Duration::from_millis(5));
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let handle = scheduler.run_later(
            2,
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
            }),
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(handle.is_cancelled());
    }
}
