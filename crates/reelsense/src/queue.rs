//! Bounded FIFO of video IDs shared by producers and the worker pool.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::models::VideoId;

/// Default number of IDs the queue holds before producers block.
pub const DEFAULT_CAPACITY: usize = 100;

/// Cloneable handle to a bounded job queue.
///
/// Every clone pushes into and pops from the same channel. `push` waits
/// while the queue is full; `close` stops new pushes while already queued
/// IDs can still be popped.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<VideoId>,
    rx: Arc<Mutex<mpsc::Receiver<VideoId>>>,
    closed: CancellationToken,
    capacity: usize,
}

impl JobQueue {
    /// Creates a queue holding at most `capacity` IDs. A zero capacity is
    /// raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: CancellationToken::new(),
            capacity,
        }
    }

    /// Appends `video_id`, waiting for space while the queue is full.
    pub async fn push(&self, video_id: VideoId) -> Result<(), WorkerError> {
        if self.closed.is_cancelled() {
            return Err(WorkerError::QueueClosed);
        }
        tokio::select! {
            sent = self.tx.send(video_id) => sent.map_err(|_| WorkerError::QueueClosed),
            _ = self.closed.cancelled() => Err(WorkerError::QueueClosed),
        }
    }

    /// Appends `video_id` without waiting.
    pub fn try_push(&self, video_id: VideoId) -> Result<(), WorkerError> {
        if self.closed.is_cancelled() {
            return Err(WorkerError::QueueClosed);
        }
        self.tx.try_send(video_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => WorkerError::QueueClosed,
        })
    }

    /// Removes the oldest ID, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<VideoId> {
        let mut rx = self.rx.lock().await;
        if self.closed.is_cancelled() {
            return rx.try_recv().ok();
        }
        tokio::select! {
            biased;
            item = rx.recv() => item,
            _ = self.closed.cancelled() => rx.try_recv().ok(),
        }
    }

    /// Number of IDs waiting to be popped.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
