//! Bounded background work queue
//!
//! Jobs go into a bounded channel read by a fixed set of worker tasks.
//! Submitting never waits: when the channel is full the job is dropped and
//! counted. [`WorkQueue::shutdown`] closes the channel and waits until the
//! workers have finished everything already queued.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CoreError;

pub struct WorkQueue<J> {
    name: &'static str,
    sender: Mutex<Option<mpsc::Sender<J>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl<J: Send + 'static> WorkQueue<J> {
    /// Spawn `workers` tasks on the current tokio runtime, each running
    /// `handler` for the jobs it receives
    pub fn start<F, Fut>(
        name: &'static str,
        workers: usize,
        capacity: usize,
        handler: F,
    ) -> Result<Self, CoreError>
    where
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| CoreError::Runtime(e.to_string()))?;
        let workers = workers.max(1);
        let capacity = capacity.max(1);

        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let handler = Arc::new(handler);

        let handles = (0..workers)
            .map(|id| {
                let receiver = receiver.clone();
                let handler = handler.clone();
                runtime.spawn(async move {
                    loop {
                        let job = receiver.lock().await.recv().await;
                        match job {
                            Some(job) => handler(job).await,
                            None => break,
                        }
                    }
                    debug!("{} worker {} stopped", name, id);
                })
            })
            .collect();

        info!(
            "Started {} queue ({} workers, capacity {})",
            name, workers, capacity
        );

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            dropped: AtomicU64::new(0),
        })
    }

    /// Queue a job without waiting. Returns false if it was dropped.
    pub fn submit(&self, job: J) -> bool {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            debug!("{} queue is shut down, dropping job", self.name);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("{} queue is full, dropping job", self.name);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("{} queue is closed, dropping job", self.name);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Jobs rejected so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting jobs and wait for the queued ones to finish
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let handles = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }

        info!("Draining {} queue", self.name);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("{} worker ended abnormally: {}", self.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        let queue = WorkQueue::start("test", 2, 64, move |_: usize| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        for job in 0..20 {
            assert!(queue.submit(job));
        }
        queue.shutdown().await;

        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert!(!queue.submit(99));
        assert_eq!(queue.dropped(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let gate = Arc::new(Semaphore::new(0));
        let worker_gate = gate.clone();
        let queue = WorkQueue::start("test", 1, 1, move |_: usize| {
            let gate = worker_gate.clone();
            async move {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
        })
        .unwrap();

        // First job is taken by the worker, second fills the channel
        assert!(queue.submit(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.submit(2));
        assert!(!queue.submit(3));
        assert_eq!(queue.dropped(), 1);

        gate.add_permits(2);
        queue.shutdown().await;
    }

    #[test]
    fn test_requires_runtime() {
        let result = WorkQueue::start("test", 1, 1, |_: usize| async {});
        assert!(matches!(result, Err(CoreError::Runtime(_))));
    }
}
