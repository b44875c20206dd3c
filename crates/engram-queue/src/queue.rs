//! Queue internals: bounded buffer, batch processor, background ticker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use engram_core::config::QueueConfig;
use engram_core::errors::{EngramError, EngramResult, QueueError};
use engram_core::models::{QueueStats, WriteOp};
use engram_core::traits::QueueExecutor;

/// Buffers write operations and applies them in batched transactions.
///
/// Ordering: ops submitted by a single thread apply in submission order.
/// A failed batch re-queues at the head; after
/// `max_consecutive_failures` failures the whole queue is dropped as a
/// last resort to unblock the write path (surfaced via `dropped_ops`).
pub struct AsyncWriteQueue {
    inner: Arc<QueueInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct QueueInner {
    executor: Arc<dyn QueueExecutor>,
    config: QueueConfig,
    buffer: Mutex<VecDeque<WriteOp>>,
    /// Serializes batch processing across the ticker and explicit flushes.
    process_lock: tokio::sync::Mutex<()>,
    processing: AtomicBool,
    shutting_down: AtomicBool,
    consecutive_failures: AtomicU32,
    notify_work: Notify,
    enqueued: AtomicU64,
    applied: AtomicU64,
    batches: AtomicU64,
    retries: AtomicU64,
    dropped: AtomicU64,
}

impl AsyncWriteQueue {
    pub fn new(executor: Arc<dyn QueueExecutor>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                executor,
                config,
                buffer: Mutex::new(VecDeque::new()),
                process_lock: tokio::sync::Mutex::new(()),
                processing: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                consecutive_failures: AtomicU32::new(0),
                notify_work: Notify::new(),
                enqueued: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                batches: AtomicU64::new(0),
                retries: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the background flush worker. Requires a tokio runtime.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = inner.notify_work.notified() => {}
                }
                inner.process_queue().await;
                if inner.shutting_down.load(Ordering::Acquire) && inner.buffer_len() == 0 {
                    break;
                }
            }
        });
        *self.worker.lock().expect("worker slot poisoned") = Some(handle);
    }

    /// Accept an op without blocking. Fails fast when the buffer is full
    /// or the queue is shutting down.
    pub fn write(&self, op: WriteOp) -> EngramResult<()> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(EngramError::Queue(QueueError::ShuttingDown));
        }
        {
            let mut buffer = self
                .inner
                .buffer
                .lock()
                .map_err(|_| EngramError::Queue(QueueError::ShuttingDown))?;
            if buffer.len() >= self.inner.config.max_queue_size {
                return Err(EngramError::Queue(QueueError::Overflow {
                    capacity: self.inner.config.max_queue_size,
                }));
            }
            buffer.push_back(op);
        }
        self.inner.enqueued.fetch_add(1, Ordering::Relaxed);
        self.inner.notify_work.notify_one();
        Ok(())
    }

    /// Drain everything currently buffered. Awaits completion.
    pub async fn flush(&self) {
        while !self.is_idle() {
            self.inner.process_queue().await;
            tokio::task::yield_now().await;
        }
    }

    /// Buffer empty AND not mid-batch.
    pub fn is_idle(&self) -> bool {
        self.inner.buffer_len() == 0 && !self.inner.processing.load(Ordering::Acquire)
    }

    /// Flush remaining work, then stop the ticker.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        self.flush().await;
        self.inner.notify_work.notify_one();
        let handle = self.worker.lock().expect("worker slot poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.inner.enqueued.load(Ordering::Relaxed),
            applied: self.inner.applied.load(Ordering::Relaxed),
            batches: self.inner.batches.load(Ordering::Relaxed),
            retries: self.inner.retries.load(Ordering::Relaxed),
            dropped_ops: self.inner.dropped.load(Ordering::Relaxed),
            pending: self.inner.buffer_len(),
        }
    }
}

impl QueueInner {
    fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Apply batches until the buffer is empty or a batch fails.
    async fn process_queue(&self) {
        let _guard = self.process_lock.lock().await;
        self.processing.store(true, Ordering::Release);

        loop {
            let batch: Vec<WriteOp> = {
                let mut buffer = match self.buffer.lock() {
                    Ok(b) => b,
                    Err(_) => break,
                };
                let take = buffer.len().min(self.config.batch_size);
                buffer.drain(..take).collect()
            };
            if batch.is_empty() {
                break;
            }

            match self.executor.apply_batch(&batch) {
                Ok(()) => {
                    self.applied.fetch_add(batch.len() as u64, Ordering::Relaxed);
                    self.batches.fetch_add(1, Ordering::Relaxed);
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                }
                Err(e) => {
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

                    if failures >= self.config.max_consecutive_failures {
                        // Last resort: drop everything to unblock the
                        // main loop and reset the error counter.
                        let dropped = {
                            let mut buffer = match self.buffer.lock() {
                                Ok(b) => b,
                                Err(_) => break,
                            };
                            let len = buffer.len() + batch.len();
                            buffer.clear();
                            len
                        };
                        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
                        self.consecutive_failures.store(0, Ordering::Relaxed);
                        tracing::warn!(
                            dropped,
                            error = %e,
                            "write queue dropped after repeated batch failures"
                        );
                    } else {
                        // Simple retry: back at the head, in order.
                        if let Ok(mut buffer) = self.buffer.lock() {
                            for op in batch.into_iter().rev() {
                                buffer.push_front(op);
                            }
                        }
                        tracing::warn!(failures, error = %e, "queue batch failed; re-queued");
                    }
                    break;
                }
            }
        }

        self.processing.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Test executor: records applied ops, fails on demand.
    struct RecordingExecutor {
        applied: StdMutex<Vec<WriteOp>>,
        fail_next: AtomicU32,
    }

    impl RecordingExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                applied: StdMutex::new(Vec::new()),
                fail_next: AtomicU32::new(0),
            })
        }

        fn applied_tables(&self) -> Vec<String> {
            self.applied
                .lock()
                .unwrap()
                .iter()
                .map(|op| op.table.clone())
                .collect()
        }
    }

    impl QueueExecutor for RecordingExecutor {
        fn apply_batch(&self, ops: &[WriteOp]) -> EngramResult<()> {
            if self.fail_next.load(Ordering::Relaxed) > 0 {
                self.fail_next.fetch_sub(1, Ordering::Relaxed);
                return Err(EngramError::Queue(QueueError::Overflow { capacity: 0 }));
            }
            self.applied.lock().unwrap().extend_from_slice(ops);
            Ok(())
        }
    }

    fn op(table: &str) -> WriteOp {
        WriteOp::insert(table, serde_json::json!({"k": 1}))
    }

    fn config() -> QueueConfig {
        QueueConfig {
            max_queue_size: 8,
            batch_size: 3,
            flush_interval: Duration::from_millis(20),
            max_consecutive_failures: 3,
        }
    }

    #[tokio::test]
    async fn flush_drains_in_submission_order() {
        let executor = RecordingExecutor::new();
        let queue = AsyncWriteQueue::new(executor.clone(), config());

        for name in ["a", "b", "c", "d", "e"] {
            queue.write(op(name)).unwrap();
        }
        queue.flush().await;

        assert!(queue.is_idle());
        assert_eq!(executor.applied_tables(), vec!["a", "b", "c", "d", "e"]);
        let stats = queue.stats();
        assert_eq!(stats.applied, 5);
        assert_eq!(stats.batches, 2, "batch of 3 then batch of 2");
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn overflow_fails_fast() {
        let executor = RecordingExecutor::new();
        let queue = AsyncWriteQueue::new(executor, config());

        for i in 0..8 {
            queue.write(op(&format!("t{i}"))).unwrap();
        }
        let err = queue.write(op("overflow")).unwrap_err();
        assert!(matches!(
            err,
            EngramError::Queue(QueueError::Overflow { capacity: 8 })
        ));
    }

    #[tokio::test]
    async fn failed_batch_requeues_then_succeeds() {
        let executor = RecordingExecutor::new();
        executor.fail_next.store(1, Ordering::Relaxed);
        let queue = AsyncWriteQueue::new(executor.clone(), config());

        queue.write(op("x")).unwrap();
        queue.write(op("y")).unwrap();
        queue.flush().await;

        assert_eq!(executor.applied_tables(), vec!["x", "y"], "order preserved");
        let stats = queue.stats();
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.dropped_ops, 0);
    }

    #[tokio::test]
    async fn repeated_failures_drop_the_queue() {
        let executor = RecordingExecutor::new();
        executor.fail_next.store(100, Ordering::Relaxed);
        let queue = AsyncWriteQueue::new(executor.clone(), config());

        for i in 0..5 {
            queue.write(op(&format!("doomed{i}"))).unwrap();
        }
        queue.flush().await;

        assert!(queue.is_idle());
        assert!(executor.applied_tables().is_empty());
        let stats = queue.stats();
        assert_eq!(stats.dropped_ops, 5);
        assert_eq!(stats.applied, 0);

        // The queue recovers: the failure counter was reset.
        executor.fail_next.store(0, Ordering::Relaxed);
        queue.write(op("alive")).unwrap();
        queue.flush().await;
        assert_eq!(executor.applied_tables(), vec!["alive"]);
    }

    #[tokio::test]
    async fn background_ticker_applies_without_flush() {
        let executor = RecordingExecutor::new();
        let queue = AsyncWriteQueue::new(executor.clone(), config());
        queue.start();

        queue.write(op("ticked")).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(executor.applied_tables(), vec!["ticked"]);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_flushes_and_rejects_new_writes() {
        let executor = RecordingExecutor::new();
        let queue = AsyncWriteQueue::new(executor.clone(), config());
        queue.start();

        queue.write(op("final")).unwrap();
        queue.shutdown().await;

        assert_eq!(executor.applied_tables(), vec!["final"]);
        let err = queue.write(op("late")).unwrap_err();
        assert!(matches!(err, EngramError::Queue(QueueError::ShuttingDown)));
    }
}
