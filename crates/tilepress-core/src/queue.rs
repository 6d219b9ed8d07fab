//! Deferred export work.
//!
//! A FIFO queue that runs exactly one job at a time on a background task.
//! Pausing stops the drain and invalidates everything already accepted;
//! clearing drops pending jobs without touching the one in flight. Stale
//! jobs are fenced by a generation token checked at dequeue time. Job
//! failures are logged, never propagated.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::BoxFuture;
use tokio::sync::Notify;

use crate::error::ExportError;

type JobFuture = BoxFuture<'static, Result<(), ExportError>>;

struct QueueJob {
    label: String,
    generation: u64,
    work: JobFuture,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueJob>,
    generation: u64,
    paused: bool,
    running: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    /// Wakes the drain task when work arrives or the queue resumes.
    wake: Notify,
    /// Wakes `wait_idle` callers whenever the drain settles.
    idle: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        // Lock poisoning would mean a panicked job holding no invariants we
        // care about; recover the data rather than cascading the panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let job = {
                let mut state = self.state();
                if state.paused {
                    None
                } else {
                    let mut next = None;
                    while let Some(job) = state.pending.pop_front() {
                        if job.generation < state.generation {
                            tracing::debug!("skipping invalidated export job '{}'", job.label);
                            continue;
                        }
                        next = Some(job);
                        break;
                    }
                    if next.is_some() {
                        state.running = true;
                    }
                    next
                }
            };

            match job {
                Some(job) => {
                    tracing::debug!("running export job '{}'", job.label);
                    if let Err(e) = job.work.await {
                        tracing::error!("export job '{}' failed: {e}", job.label);
                    }
                    self.state().running = false;
                    self.idle.notify_waiters();
                }
                None => {
                    self.idle.notify_waiters();
                    self.wake.notified().await;
                }
            }
        }
    }
}

/// Aborts the drain task when the last queue handle is dropped.
struct WorkerGuard(tokio::task::JoinHandle<()>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to the deferred export queue. Cheap to clone; all clones share
/// the same drain task.
#[derive(Clone)]
pub struct ExportQueue {
    inner: Arc<Inner>,
    _worker: Arc<WorkerGuard>,
}

impl ExportQueue {
    /// Create a queue and spawn its drain task on the current runtime.
    pub fn new() -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            idle: Notify::new(),
        });
        let worker = tokio::spawn(Arc::clone(&inner).drain());
        Self {
            inner,
            _worker: Arc::new(WorkerGuard(worker)),
        }
    }

    /// Append a job to the queue.
    ///
    /// Jobs submitted while the queue is paused are dropped silently; a later
    /// `resume` does not resurrect them.
    pub fn enqueue<F>(&self, label: impl Into<String>, work: F)
    where
        F: std::future::Future<Output = Result<(), ExportError>> + Send + 'static,
    {
        let label = label.into();
        {
            let mut state = self.inner.state();
            if state.paused {
                tracing::debug!("queue paused, dropping export job '{label}'");
                return;
            }
            let generation = state.generation;
            state.pending.push_back(QueueJob {
                label,
                generation,
                work: Box::pin(work),
            });
        }
        self.inner.wake.notify_one();
    }

    /// Stop draining and invalidate everything accepted so far.
    ///
    /// The job currently in flight (if any) still completes.
    pub fn pause(&self) {
        let mut state = self.inner.state();
        state.paused = true;
        state.generation += 1;
    }

    /// Resume draining jobs accepted after the pause.
    pub fn resume(&self) {
        self.inner.state().paused = false;
        self.inner.wake.notify_one();
    }

    /// Drop all pending jobs. The in-flight job still completes.
    pub fn clear(&self) {
        let mut state = self.inner.state();
        state.pending.clear();
        state.generation += 1;
    }

    /// Number of jobs waiting to run (not counting the one in flight).
    pub fn pending(&self) -> usize {
        self.inner.state().pending.len()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state().paused
    }

    /// Wait until nothing is pending and nothing is in flight.
    ///
    /// A paused queue with pending work never becomes idle; resume or clear
    /// it first.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            {
                let state = self.inner.state();
                if state.pending.is_empty() && !state.running {
                    return;
                }
            }
            notified.await;
        }
    }
}

impl Default for ExportQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_run_in_fifo_order() {
        let queue = ExportQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = Arc::clone(&log);
            queue.enqueue(format!("job-{i}"), async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                log.lock().unwrap().push(i);
                Ok(())
            });
        }
        queue.wait_idle().await;

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn only_one_job_runs_at_a_time() {
        let queue = ExportQueue::new();
        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        for i in 0..4 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            queue.enqueue(format!("job-{i}"), async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }
        queue.wait_idle().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn enqueue_while_paused_is_dropped() {
        let queue = ExportQueue::new();
        let ran = Arc::new(AtomicU32::new(0));

        queue.pause();
        {
            let ran = Arc::clone(&ran);
            queue.enqueue("while-paused", async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(queue.pending(), 0);

        queue.resume();
        queue.wait_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pause_invalidates_jobs_queued_behind_the_running_one() {
        let queue = ExportQueue::new();
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let ran_b = Arc::new(AtomicU32::new(0));

        {
            let started = Arc::clone(&started);
            let gate = Arc::clone(&gate);
            queue.enqueue("gated", async move {
                started.notify_one();
                gate.notified().await;
                Ok(())
            });
        }
        started.notified().await;

        {
            let ran_b = Arc::clone(&ran_b);
            queue.enqueue("stale", async move {
                ran_b.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(queue.pending(), 1);

        queue.pause();
        gate.notify_one();
        queue.resume();
        queue.wait_idle().await;

        assert_eq!(ran_b.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn clear_drops_pending_but_not_in_flight() {
        let queue = ExportQueue::new();
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let finished_first = Arc::new(AtomicU32::new(0));
        let ran_rest = Arc::new(AtomicU32::new(0));

        {
            let started = Arc::clone(&started);
            let gate = Arc::clone(&gate);
            let finished_first = Arc::clone(&finished_first);
            queue.enqueue("in-flight", async move {
                started.notify_one();
                gate.notified().await;
                finished_first.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        started.notified().await;

        for i in 0..3 {
            let ran_rest = Arc::clone(&ran_rest);
            queue.enqueue(format!("pending-{i}"), async move {
                ran_rest.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        queue.clear();
        gate.notify_one();
        queue.wait_idle().await;

        assert_eq!(finished_first.load(Ordering::SeqCst), 1);
        assert_eq!(ran_rest.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_job_does_not_stall_the_queue() {
        let queue = ExportQueue::new();
        let ran_after = Arc::new(AtomicU32::new(0));

        queue.enqueue("failing", async move {
            Err(ExportError::Join("synthetic".to_string()))
        });
        {
            let ran_after = Arc::clone(&ran_after);
            queue.enqueue("following", async move {
                ran_after.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        queue.wait_idle().await;

        assert_eq!(ran_after.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_empty() {
        let queue = ExportQueue::new();
        tokio::time::timeout(Duration::from_millis(100), queue.wait_idle())
            .await
            .expect("wait_idle should not block on an empty queue");
    }
}
