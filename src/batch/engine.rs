use crate::delivery::EchoGuard;
use crate::error::{Result, UserSyncError};
use crate::metrics;
use crate::models::{
    BatchJobId, BatchJobResult, BatchJobStatus, Record, RecordOutcome, SyncBatch, SyncDirection,
    UpsertOutcome,
};
use crate::system::SystemConnector;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

struct JobEntry {
    direction: SyncDirection,
    status: BatchJobStatus,
    handle: Option<JoinHandle<()>>,
}

/// Applies batches to a destination system as background jobs.
///
/// `submit` returns immediately with a job id; `await_completion` polls the
/// job until it reaches a terminal state or the timeout expires.
pub struct BatchUpsertEngine {
    jobs: Arc<RwLock<HashMap<BatchJobId, JobEntry>>>,
    concurrency: usize,
}

impl BatchUpsertEngine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            concurrency: concurrency.max(1),
        }
    }

    /// Start applying `batch` to `destination`
    pub async fn submit(
        &self,
        destination: Arc<dyn SystemConnector>,
        batch: SyncBatch,
    ) -> BatchJobId {
        self.submit_tracked(destination, batch, None).await
    }

    /// Like [`submit`](Self::submit), registering every successful write in
    /// `echo_guard` the moment the destination acknowledges it
    pub async fn submit_tracked(
        &self,
        destination: Arc<dyn SystemConnector>,
        batch: SyncBatch,
        echo_guard: Option<Arc<EchoGuard>>,
    ) -> BatchJobId {
        let job_id = BatchJobId::new();
        let direction = batch.direction;

        // Register before spawning so the job is visible to `status` at once
        let mut jobs = self.jobs.write().await;
        jobs.insert(
            job_id.clone(),
            JobEntry {
                direction,
                status: BatchJobStatus::Pending,
                handle: None,
            },
        );

        let handle = tokio::spawn(Self::run_job(
            self.jobs.clone(),
            job_id.clone(),
            destination,
            batch,
            self.concurrency,
            echo_guard,
        ));
        if let Some(entry) = jobs.get_mut(&job_id) {
            entry.handle = Some(handle);
        }

        debug!("Submitted batch job {} for direction '{}'", job_id, direction);
        job_id
    }

    async fn run_job(
        jobs: Arc<RwLock<HashMap<BatchJobId, JobEntry>>>,
        job_id: BatchJobId,
        destination: Arc<dyn SystemConnector>,
        batch: SyncBatch,
        concurrency: usize,
        echo_guard: Option<Arc<EchoGuard>>,
    ) {
        let started_at = Utc::now();
        let total = batch.len();
        let direction = batch.direction;
        Self::set_status(&jobs, &job_id, BatchJobStatus::Running { processed: 0, total }).await;

        let mut outcomes = Vec::with_capacity(total);
        let mut results = stream::iter(batch.records)
            .map(|record| {
                let destination = destination.clone();
                let echo_guard = echo_guard.clone();
                async move {
                    upsert_record(destination.as_ref(), record, echo_guard.as_deref()).await
                }
            })
            .buffered(concurrency);

        while let Some(outcome) = results.next().await {
            metrics::record_upsert(direction, outcome.outcome.label());
            if let UpsertOutcome::Failed(reason) = &outcome.outcome {
                warn!(
                    "Upsert of {} into {} failed: {}",
                    outcome.identifier.as_deref().unwrap_or("<no identifier>"),
                    destination.descriptor().name,
                    reason
                );
            }
            outcomes.push(outcome);
            Self::set_status(
                &jobs,
                &job_id,
                BatchJobStatus::Running {
                    processed: outcomes.len(),
                    total,
                },
            )
            .await;
        }

        let result = BatchJobResult::from_outcomes(job_id.clone(), outcomes, started_at);
        metrics::record_batch(direction, result.state);
        info!(
            "Batch job {} finished: {:?} ({} ok, {} failed)",
            job_id,
            result.state,
            result.success_count(),
            result.failed_count()
        );
        Self::set_status(&jobs, &job_id, BatchJobStatus::Completed(result)).await;
    }

    async fn set_status(
        jobs: &RwLock<HashMap<BatchJobId, JobEntry>>,
        job_id: &BatchJobId,
        status: BatchJobStatus,
    ) {
        if let Some(entry) = jobs.write().await.get_mut(job_id) {
            entry.status = status;
        }
    }

    pub async fn status(&self, job_id: &BatchJobId) -> Option<BatchJobStatus> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .map(|entry| entry.status.clone())
    }

    /// Wait for a job to terminate, checking every `poll_interval`.
    /// Fails with `Timeout` when the job is still running after `timeout`.
    pub async fn await_completion(
        &self,
        job_id: &BatchJobId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<BatchJobResult> {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            match self.status(job_id).await {
                None => return Err(UserSyncError::NotFound(format!("batch job {}", job_id))),
                Some(BatchJobStatus::Completed(result)) => return Ok(result),
                Some(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(UserSyncError::Timeout {
                    job_id: job_id.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// Stop a job that is still running; already-applied records stay applied
    pub async fn abort(&self, job_id: &BatchJobId) {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(job_id) {
            if let Some(handle) = entry.handle.take() {
                handle.abort();
                warn!("Aborted batch job {} for direction '{}'", job_id, entry.direction);
            }
            if !entry.status.is_terminal() {
                entry.status = BatchJobStatus::Completed(BatchJobResult::failed(
                    job_id.clone(),
                    "aborted".to_string(),
                    Utc::now(),
                ));
            }
        }
    }

    /// Drop a job's bookkeeping once its result has been consumed
    pub async fn forget(&self, job_id: &BatchJobId) {
        self.jobs.write().await.remove(job_id);
    }

    /// Remove all terminal jobs; returns how many were removed
    pub async fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| !entry.status.is_terminal());
        before - jobs.len()
    }

    pub async fn active_jobs(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|entry| !entry.status.is_terminal())
            .count()
    }
}

/// Match by identifier, insert when absent, otherwise update the given fields only
async fn upsert_record(
    destination: &dyn SystemConnector,
    record: Record,
    echo_guard: Option<&EchoGuard>,
) -> RecordOutcome {
    let descriptor = destination.descriptor();
    let Some(identifier) = record.identifier(&descriptor.identifier_field) else {
        return RecordOutcome {
            identifier: None,
            outcome: UpsertOutcome::Failed(format!(
                "missing identifier field '{}'",
                descriptor.identifier_field
            )),
            written_at: None,
        };
    };

    let existing = match destination.find_by_identifier(&identifier).await {
        Ok(existing) => existing,
        Err(e) => return failed(identifier, e),
    };

    let written = match existing {
        None => destination
            .insert(record)
            .await
            .map(|receipt| (UpsertOutcome::Inserted, receipt)),
        Some(existing) => {
            let primary_key = match existing.key(&descriptor.primary_key_field) {
                Some(pk) => pk,
                None => {
                    return failed(
                        identifier,
                        UserSyncError::Pipeline(format!(
                            "existing record has no '{}'",
                            descriptor.primary_key_field
                        )),
                    )
                }
            };
            destination
                .update(&primary_key, record)
                .await
                .map(|receipt| (UpsertOutcome::Updated, receipt))
        }
    };

    match written {
        Ok((outcome, receipt)) => {
            if let (Some(guard), Some(written_at)) = (echo_guard, receipt.last_modified) {
                guard
                    .record_write(descriptor.id, &identifier, written_at)
                    .await;
            }
            RecordOutcome {
                identifier: Some(identifier),
                outcome,
                written_at: receipt.last_modified,
            }
        }
        Err(e) => failed(identifier, e),
    }
}

fn failed(identifier: String, error: UserSyncError) -> RecordOutcome {
    RecordOutcome {
        identifier: Some(identifier),
        outcome: UpsertOutcome::Failed(error.to_string()),
        written_at: None,
    }
}
