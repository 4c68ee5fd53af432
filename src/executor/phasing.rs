//! Wave-scoped task submission.
//!
//! A [`PhasingExecutor`] runs tasks in *waves*. At most one wave is open per
//! executor at a time; opening a second while one is active is an error.
//! Tasks submitted to a wave share a bounded worker budget enforced by a
//! semaphore, and the wave can be awaited as a unit. Dropping the wave guard
//! releases the wave even when `join` was never reached, so an aborted wave
//! cannot wedge later ones.

use crate::core::MasonError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore};

/// Executor handing out task waves over a fixed worker budget.
pub struct PhasingExecutor {
    semaphore: Arc<Semaphore>,
    wave_open: AtomicBool,
}

impl PhasingExecutor {
    /// Create an executor with `workers` concurrent task slots.
    pub fn new(workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            wave_open: AtomicBool::new(false),
        }
    }

    /// Open a wave. Fails with [`MasonError::WaveAlreadyOpen`] while another
    /// wave from this executor is alive.
    pub fn phase(&self) -> Result<Phase<'_>, MasonError> {
        if self.wave_open.swap(true, Ordering::AcqRel) {
            return Err(MasonError::WaveAlreadyOpen);
        }
        Ok(Phase {
            executor: self,
            pending: Arc::new(PendingTasks {
                count: AtomicUsize::new(0),
                done: Notify::new(),
            }),
        })
    }
}

struct PendingTasks {
    count: AtomicUsize,
    done: Notify,
}

/// An open wave of tasks. The wave closes when the guard drops.
pub struct Phase<'a> {
    executor: &'a PhasingExecutor,
    pending: Arc<PendingTasks>,
}

impl Phase<'_> {
    /// Submit a task to the wave. It starts once a worker slot frees up.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        let semaphore = self.executor.semaphore.clone();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            // The semaphore is never closed, so acquisition only fails if the
            // runtime is shutting down, in which case running is moot.
            let _permit = semaphore.acquire_owned().await.ok();
            task.await;
            if pending.count.fetch_sub(1, Ordering::AcqRel) == 1 {
                pending.done.notify_waiters();
            }
        });
    }

    /// Wait until every task submitted to this wave has finished.
    pub async fn join(&self) {
        loop {
            // Register before checking so a completion between the check and
            // the await cannot be missed.
            let notified = self.pending.done.notified();
            if self.pending.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        self.executor.wave_open.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn only_one_wave_at_a_time() {
        let executor = PhasingExecutor::new(2);
        let wave = executor.phase().unwrap();
        assert!(matches!(executor.phase(), Err(MasonError::WaveAlreadyOpen)));
        drop(wave);
        assert!(executor.phase().is_ok());
    }

    #[tokio::test]
    async fn join_waits_for_every_task() {
        let executor = PhasingExecutor::new(4);
        let wave = executor.phase().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let counter = counter.clone();
            wave.spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::AcqRel);
            });
        }
        wave.join().await;
        assert_eq!(counter.load(Ordering::Acquire), 16);
    }

    #[tokio::test]
    async fn worker_budget_bounds_concurrency() {
        let executor = PhasingExecutor::new(2);
        let wave = executor.phase().unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let running = running.clone();
            let peak = peak.clone();
            wave.spawn(async move {
                let now = running.fetch_add(1, Ordering::AcqRel) + 1;
                peak.fetch_max(now, Ordering::AcqRel);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::AcqRel);
            });
        }
        wave.join().await;
        assert!(peak.load(Ordering::Acquire) <= 2);
    }

    #[tokio::test]
    async fn dropping_an_unjoined_wave_releases_the_executor() {
        let executor = PhasingExecutor::new(1);
        {
            let wave = executor.phase().unwrap();
            wave.spawn(async {});
            // Dropped without join, as after a scheduling error.
        }
        let wave = executor.phase().unwrap();
        wave.join().await;
    }

    #[tokio::test]
    async fn join_on_empty_wave_returns_immediately() {
        let executor = PhasingExecutor::new(1);
        let wave = executor.phase().unwrap();
        wave.join().await;
    }
}
