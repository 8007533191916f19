use crate::batch::BatchUpsertEngine;
use crate::config::SyncConfig;
use crate::delivery::{BoundaryLedger, EchoGuard};
use crate::error::{Result, UserSyncError};
use crate::metrics;
use crate::models::{Record, SyncBatch, SyncDirection, SystemId, Watermark};
use crate::pipeline::filter::{FilterDecision, SyncFilter};
use crate::pipeline::poller::ChangePoller;
use crate::pipeline::sanitizer::FieldSanitizer;
use crate::system::SystemConnector;
use crate::watermark::WatermarkStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a direction is within its current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionState {
    Idle,
    Polling,
    Filtering,
    Submitting,
    Awaiting,
}

/// Summary of one poll-and-apply run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub direction: SyncDirection,
    pub watermark_before: Watermark,
    pub watermark_after: Watermark,
    pub polled: usize,
    pub propagated: usize,
    pub skipped_inactive: usize,
    pub skipped_echo: usize,
    pub skipped_own_write: usize,
    pub skipped_delivered: usize,
    pub skipped_invalid: usize,
    pub upserted: usize,
    pub failed: usize,
    pub batches: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn new(direction: SyncDirection, watermark: Watermark, started_at: DateTime<Utc>) -> Self {
        Self {
            direction,
            watermark_before: watermark,
            watermark_after: watermark,
            polled: 0,
            propagated: 0,
            skipped_inactive: 0,
            skipped_echo: 0,
            skipped_own_write: 0,
            skipped_delivered: 0,
            skipped_invalid: 0,
            upserted: 0,
            failed: 0,
            batches: 0,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_inactive
            + self.skipped_echo
            + self.skipped_own_write
            + self.skipped_delivered
            + self.skipped_invalid
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionStatus {
    pub direction: SyncDirection,
    pub state: DirectionState,
    pub last_report: Option<RunReport>,
    pub last_error: Option<String>,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl DirectionStatus {
    fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            state: DirectionState::Idle,
            last_report: None,
            last_error: None,
            runs_succeeded: 0,
            runs_failed: 0,
            last_run_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub system_a: bool,
    pub system_b: bool,
    pub watermark_storage: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.system_a && self.system_b && self.watermark_storage
    }
}

/// Typed stages of one direction
struct DirectionPipeline {
    source: Arc<dyn SystemConnector>,
    destination: Arc<dyn SystemConnector>,
    poller: ChangePoller,
    sanitizer: FieldSanitizer,
    filter: SyncFilter,
}

impl DirectionPipeline {
    fn new(
        config: &SyncConfig,
        source: Arc<dyn SystemConnector>,
        destination: Arc<dyn SystemConnector>,
    ) -> Self {
        let sanitizer =
            FieldSanitizer::for_direction(config, source.descriptor(), destination.descriptor());
        let filter = SyncFilter::new(config.clone(), source.descriptor());
        Self {
            source,
            destination,
            poller: ChangePoller::new(config.page_size),
            sanitizer,
            filter,
        }
    }

    /// Sanitized copy keyed by the destination's identifier field
    fn outbound(&self, record: &Record) -> Record {
        let mut clean = self.sanitizer.sanitize(record);
        let from = &self.source.descriptor().identifier_field;
        let to = &self.destination.descriptor().identifier_field;
        if from != to {
            if let Some(value) = clean.remove(from) {
                clean.insert(to.clone(), value);
            }
        }
        clean
    }
}

struct DirectionRuntime {
    pipeline: DirectionPipeline,
    run_lock: Mutex<()>,
    status: RwLock<DirectionStatus>,
}

impl DirectionRuntime {
    fn new(direction: SyncDirection, pipeline: DirectionPipeline) -> Self {
        Self {
            pipeline,
            run_lock: Mutex::new(()),
            status: RwLock::new(DirectionStatus::new(direction)),
        }
    }

    async fn set_state(&self, state: DirectionState) {
        self.status.write().await.state = state;
    }
}

/// Runs the A->B and B->A directions.
///
/// A run polls the source from the direction's watermark, drops records that
/// must not travel (already delivered, echoes of our own writes, inactive),
/// strips system fields, upserts the rest into the destination in batches and
/// advances the watermark only if every batch succeeded. A failed run leaves
/// the watermark untouched so the next trigger re-polls the same window.
pub struct SyncOrchestrator {
    config: Arc<SyncConfig>,
    system_a: Arc<dyn SystemConnector>,
    system_b: Arc<dyn SystemConnector>,
    watermarks: Arc<WatermarkStore>,
    engine: Arc<BatchUpsertEngine>,
    echo_guard: Arc<EchoGuard>,
    boundary: BoundaryLedger,
    a_to_b: DirectionRuntime,
    b_to_a: DirectionRuntime,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        system_a: Arc<dyn SystemConnector>,
        system_b: Arc<dyn SystemConnector>,
        watermarks: Arc<WatermarkStore>,
        engine: Arc<BatchUpsertEngine>,
    ) -> Self {
        let a_to_b = DirectionPipeline::new(&config, system_a.clone(), system_b.clone());
        let b_to_a = DirectionPipeline::new(&config, system_b.clone(), system_a.clone());

        Self {
            config: Arc::new(config),
            system_a,
            system_b,
            watermarks,
            engine,
            echo_guard: Arc::new(EchoGuard::new()),
            boundary: BoundaryLedger::new(),
            a_to_b: DirectionRuntime::new(SyncDirection::AToB, a_to_b),
            b_to_a: DirectionRuntime::new(SyncDirection::BToA, b_to_a),
        }
    }

    fn runtime(&self, direction: SyncDirection) -> &DirectionRuntime {
        match direction {
            SyncDirection::AToB => &self.a_to_b,
            SyncDirection::BToA => &self.b_to_a,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn system(&self, id: SystemId) -> Arc<dyn SystemConnector> {
        match id {
            SystemId::A => self.system_a.clone(),
            SystemId::B => self.system_b.clone(),
        }
    }

    pub fn echo_guard(&self) -> Arc<EchoGuard> {
        self.echo_guard.clone()
    }

    /// Poll, filter and apply one direction once.
    ///
    /// Fails with `AlreadyRunning` when the direction is mid-run.
    pub async fn run_once(&self, direction: SyncDirection) -> Result<RunReport> {
        let runtime = self.runtime(direction);
        let _guard = runtime
            .run_lock
            .try_lock()
            .map_err(|_| UserSyncError::AlreadyRunning(direction.to_string()))?;

        info!("Starting sync run for direction '{}'", direction);
        let timer = Instant::now();
        let result = self.execute(direction, runtime).await;
        metrics::observe_run(direction, result.is_ok(), timer.elapsed());

        let mut status = runtime.status.write().await;
        status.state = DirectionState::Idle;
        status.last_run_at = Some(Utc::now());
        match &result {
            Ok(report) => {
                status.runs_succeeded += 1;
                status.last_report = Some(report.clone());
                status.last_error = None;
                info!(
                    "Sync run for '{}' finished: {} polled, {} propagated, {} skipped, watermark {}",
                    direction,
                    report.polled,
                    report.propagated,
                    report.skipped(),
                    report.watermark_after
                );
            }
            Err(e) => {
                status.runs_failed += 1;
                status.last_error = Some(e.to_string());
                error!("Sync run for '{}' failed: {}", direction, e);
            }
        }

        result
    }

    async fn execute(&self, direction: SyncDirection, runtime: &DirectionRuntime) -> Result<RunReport> {
        let pipeline = &runtime.pipeline;
        let started_at = Utc::now();

        runtime.set_state(DirectionState::Polling).await;
        let watermark = self.watermarks.get(direction).await?;
        let polled = pipeline
            .poller
            .collect(pipeline.source.as_ref(), watermark)
            .await?;
        metrics::record_polled(direction, polled.records.len());

        let mut report = RunReport::new(direction, watermark, started_at);
        report.polled = polled.records.len();

        runtime.set_state(DirectionState::Filtering).await;
        let outbound = self
            .select_outbound(direction, pipeline, &polled.records, &mut report)
            .await;
        report.propagated = outbound.len();

        for batch in SyncBatch::chunked(direction, outbound, self.config.page_size) {
            runtime.set_state(DirectionState::Submitting).await;
            report.batches += 1;
            let job_id = self
                .engine
                .submit_tracked(pipeline.destination.clone(), batch, self.tracked_writes())
                .await;

            runtime.set_state(DirectionState::Awaiting).await;
            let waited = self
                .engine
                .await_completion(
                    &job_id,
                    self.config.batch_timeout(),
                    self.config.batch_poll_interval(),
                )
                .await;
            let result = match waited {
                Ok(result) => result,
                Err(e) => {
                    if matches!(e, UserSyncError::Timeout { .. }) {
                        self.engine.abort(&job_id).await;
                    }
                    self.engine.forget(&job_id).await;
                    return Err(e);
                }
            };
            self.engine.forget(&job_id).await;

            report.upserted += result.success_count();
            report.failed += result.failed_count();
            if !result.is_successful() {
                warn!(
                    "Batch job {} for '{}' ended {:?}; keeping watermark at {}",
                    result.job_id, direction, result.state, watermark
                );
            }
            result.into_result()?;
        }

        let next = polled.next_watermark(watermark);
        let advanced = self.watermarks.set(direction, next).await?;
        report.watermark_after = advanced;

        let lm_field = &pipeline.source.descriptor().last_modified_field;
        let id_field = &pipeline.source.descriptor().identifier_field;
        let at_boundary: HashSet<String> = polled
            .records
            .iter()
            .filter(|r| r.timestamp(lm_field).map(Watermark::new) == Some(advanced))
            .filter_map(|r| r.identifier(id_field))
            .collect();
        self.boundary.commit(direction, advanced, at_boundary).await;

        report.finished_at = Utc::now();
        Ok(report)
    }

    async fn select_outbound(
        &self,
        direction: SyncDirection,
        pipeline: &DirectionPipeline,
        records: &[Record],
        report: &mut RunReport,
    ) -> Vec<Record> {
        let source = pipeline.source.descriptor();
        let mut outbound = Vec::with_capacity(records.len());

        for record in records {
            let modified_at = record.timestamp(&source.last_modified_field).map(Watermark::new);
            let Some(identifier) = record.identifier(&source.identifier_field) else {
                warn!(
                    "Skipping record from {} without '{}'",
                    source.name, source.identifier_field
                );
                report.skipped_invalid += 1;
                metrics::record_skipped(direction, "missing_identifier");
                continue;
            };

            if self
                .boundary
                .already_delivered(direction, &identifier, modified_at)
                .await
            {
                debug!("{} already delivered at the watermark", identifier);
                report.skipped_delivered += 1;
                metrics::record_skipped(direction, "delivered");
                continue;
            }

            if self.config.echo_suppression.track_writes
                && self
                    .echo_guard
                    .is_echo(source.id, &identifier, modified_at)
                    .await
            {
                report.skipped_echo += 1;
                metrics::record_skipped(direction, "echo");
                continue;
            }

            match pipeline.filter.evaluate(record) {
                FilterDecision::Propagate => outbound.push(pipeline.outbound(record)),
                FilterDecision::Inactive => {
                    report.skipped_inactive += 1;
                    metrics::record_skipped(direction, FilterDecision::Inactive.reason());
                }
                FilterDecision::OwnWrite => {
                    report.skipped_own_write += 1;
                    metrics::record_skipped(direction, FilterDecision::OwnWrite.reason());
                }
            }
        }

        outbound
    }

    fn tracked_writes(&self) -> Option<Arc<EchoGuard>> {
        self.config
            .echo_suppression
            .track_writes
            .then(|| self.echo_guard.clone())
    }

    /// Run both directions concurrently
    pub async fn run_all(&self) -> Vec<(SyncDirection, Result<RunReport>)> {
        let (a_to_b, b_to_a) = tokio::join!(
            self.run_once(SyncDirection::AToB),
            self.run_once(SyncDirection::BToA)
        );
        vec![(SyncDirection::AToB, a_to_b), (SyncDirection::BToA, b_to_a)]
    }

    pub async fn status(&self, direction: SyncDirection) -> DirectionStatus {
        self.runtime(direction).status.read().await.clone()
    }

    /// Stored watermark per direction, `None` before the first run
    pub async fn watermarks(&self) -> Result<Vec<(SyncDirection, Option<Watermark>)>> {
        let mut watermarks = Vec::with_capacity(SyncDirection::ALL.len());
        for direction in SyncDirection::ALL {
            watermarks.push((direction, self.watermarks.peek(direction).await?));
        }
        Ok(watermarks)
    }

    /// Forget a direction's watermark; refused while the direction is running
    pub async fn reset_watermark(&self, direction: SyncDirection) -> Result<()> {
        let _guard = self
            .runtime(direction)
            .run_lock
            .try_lock()
            .map_err(|_| UserSyncError::AlreadyRunning(direction.to_string()))?;
        self.watermarks.reset(direction).await?;
        self.boundary.reset(direction).await;
        Ok(())
    }

    pub async fn health(&self) -> HealthReport {
        let (system_a, system_b, watermark_storage) = tokio::join!(
            self.system_a.is_healthy(),
            self.system_b.is_healthy(),
            self.watermarks.is_healthy()
        );
        HealthReport {
            system_a,
            system_b,
            watermark_storage,
        }
    }
}
