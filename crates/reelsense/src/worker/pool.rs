//! Fixed-size pool of tokio workers draining the job queue.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db::job_repo;
use crate::models::VideoId;
use crate::pipeline::{NoopProgress, Pipeline, PipelineError, ProgressReporter, RunOutcome};
use crate::queue::JobQueue;
use crate::sanitize::{truncate_for_log, MAX_LOG_TEXT};

use super::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub retry: RetryPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            retry: RetryPolicy::default(),
        }
    }
}

/// Owns the worker tasks for the lifetime of the process.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    queue: JobQueue,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Spawns `config.worker_count` workers on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is 0.
    pub fn start(queue: JobQueue, pipeline: Arc<Pipeline>, config: PoolConfig) -> Self {
        Self::start_with_progress(queue, pipeline, config, Arc::new(NoopProgress))
    }

    pub fn start_with_progress(
        queue: JobQueue,
        pipeline: Arc<Pipeline>,
        config: PoolConfig,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        assert!(config.worker_count > 0, "Worker count must be > 0");

        let cancel = CancellationToken::new();
        let workers = (0..config.worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue.clone(),
                    pipeline: pipeline.clone(),
                    retry: config.retry.clone(),
                    cancel: cancel.clone(),
                    progress: progress.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        info!("Started {} workers", config.worker_count);

        Self {
            workers,
            queue,
            cancel,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Cancels in-flight runs and stops intake. Cancelled runs go back to
    /// `pending`; IDs still queued stay `pending` in the database.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool");
        self.cancel.cancel();
        self.queue.close();
    }

    /// Stops intake and waits until every queued ID has been processed.
    pub async fn drain(self) {
        info!(queued = self.queue.len(), "Draining worker pool");
        self.queue.close();
        self.wait().await;
    }

    /// Waits for all workers to exit. Call after [`WorkerPool::shutdown`]
    /// or closing the queue.
    pub async fn wait(self) {
        for (id, handle) in self.workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("Worker {} panicked: {}", id, e);
            }
        }
        info!("Worker pool stopped");
    }
}

struct Worker {
    id: usize,
    queue: JobQueue,
    pipeline: Arc<Pipeline>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
}

impl Worker {
    async fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            let video_id = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.queue.pop() => match next {
                    Some(id) => id,
                    None => break,
                },
            };
            self.process(video_id).await;
        }

        debug!("Worker {} stopped", self.id);
    }

    /// Runs one job in its own task so a panic fails the job, not the worker.
    async fn process(&self, video_id: VideoId) {
        let task = tokio::spawn(run_with_retry(
            self.pipeline.clone(),
            video_id,
            self.id,
            self.retry.clone(),
            self.cancel.clone(),
            self.progress.clone(),
        ));

        match task.await {
            Ok(RunOutcome::Completed(done)) => {
                debug!(
                    video_id,
                    worker_id = self.id,
                    report_id = done.report_id,
                    "Job completed"
                );
            }
            Ok(RunOutcome::Failed(e)) => {
                warn!(
                    video_id,
                    worker_id = self.id,
                    error = %truncate_for_log(&e.to_string(), MAX_LOG_TEXT),
                    "Job failed"
                );
            }
            Ok(RunOutcome::Cancelled) => {
                debug!(video_id, worker_id = self.id, "Job cancelled");
            }
            Err(e) => {
                error!("Worker {} panicked on video {}: {}", self.id, video_id, e);
                self.pipeline
                    .finish(video_id, Err(PipelineError::Panicked(e.to_string())));
            }
        }
    }
}

/// Attempts `video_id` until it succeeds, fails permanently, runs out of
/// retries, or is cancelled, then records the outcome.
async fn run_with_retry(
    pipeline: Arc<Pipeline>,
    video_id: VideoId,
    worker_id: usize,
    retry: RetryPolicy,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
) -> RunOutcome {
    loop {
        let result = pipeline
            .attempt(video_id, worker_id, &cancel, progress.as_ref())
            .await;

        let error = match result {
            Err(e) if e.is_retryable() => e,
            other => return pipeline.finish(video_id, other),
        };

        let Some(delay) = next_retry_delay(&pipeline, video_id, &retry) else {
            return pipeline.finish(video_id, Err(error));
        };

        warn!(
            video_id,
            worker_id,
            error = %truncate_for_log(&error.to_string(), MAX_LOG_TEXT),
            delay_ms = delay.as_millis() as u64,
            "Retryable failure, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                return pipeline.finish(video_id, Err(PipelineError::Cancelled));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Consumes one retry from the job row. `None` when the budget is spent
/// or the row cannot be read.
fn next_retry_delay(
    pipeline: &Pipeline,
    video_id: VideoId,
    retry: &RetryPolicy,
) -> Option<std::time::Duration> {
    let db = pipeline.database();
    let job = match job_repo::find_by_video_id(db, video_id) {
        Ok(Some(job)) => job,
        Ok(None) => return None,
        Err(e) => {
            error!(video_id, error = %e, "Failed to read retry count");
            return None;
        }
    };
    if job.retry_count >= retry.max_retries {
        return None;
    }

    match job_repo::increment_retry(db, video_id) {
        Ok(count) => Some(retry.delay_for(count.saturating_sub(1))),
        Err(e) => {
            error!(video_id, error = %e, "Failed to record retry");
            None
        }
    }
}
