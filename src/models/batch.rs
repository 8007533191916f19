use crate::error::{Result, UserSyncError};
use crate::models::{Record, SyncDirection, Watermark};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered records bound for one direction's destination system
#[derive(Debug, Clone)]
pub struct SyncBatch {
    pub direction: SyncDirection,
    pub records: Vec<Record>,
}

impl SyncBatch {
    pub fn new(direction: SyncDirection, records: Vec<Record>) -> Self {
        Self { direction, records }
    }

    /// Split records into batches of at most `page_size` records
    pub fn chunked(direction: SyncDirection, records: Vec<Record>, page_size: usize) -> Vec<Self> {
        let page_size = page_size.max(1);
        let mut batches = Vec::new();
        let mut iter = records.into_iter().peekable();
        while iter.peek().is_some() {
            let chunk: Vec<Record> = iter.by_ref().take(page_size).collect();
            batches.push(Self::new(direction, chunk));
        }
        batches
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchJobId(pub String);

impl BatchJobId {
    pub fn new() -> Self {
        BatchJobId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for BatchJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Success,
    Failure,
    Partial,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Success => "success",
            BatchState::Failure => "failure",
            BatchState::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Failed(String),
}

impl UpsertOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, UpsertOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Business identifier, or `None` when the record carried none
    pub identifier: Option<String>,
    pub outcome: UpsertOutcome,
    /// Last-modified stamp the destination gave the written record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_at: Option<Watermark>,
}

/// Terminal result of a batch job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobResult {
    pub job_id: BatchJobId,
    pub state: BatchState,
    pub outcomes: Vec<RecordOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchJobResult {
    /// Derive the terminal state from per-record outcomes
    pub fn from_outcomes(
        job_id: BatchJobId,
        outcomes: Vec<RecordOutcome>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let failed = outcomes.iter().filter(|o| !o.outcome.is_success()).count();
        let state = if failed == 0 {
            BatchState::Success
        } else if failed == outcomes.len() {
            BatchState::Failure
        } else {
            BatchState::Partial
        };

        Self {
            job_id,
            state,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// A job that failed as a whole before any record was applied
    pub fn failed(job_id: BatchJobId, reason: String, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            state: BatchState::Failure,
            outcomes: vec![RecordOutcome {
                identifier: None,
                outcome: UpsertOutcome::Failed(reason),
                written_at: None,
            }],
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.state == BatchState::Success
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn errors(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                UpsertOutcome::Failed(reason) => Some(format!(
                    "{}: {}",
                    o.identifier.as_deref().unwrap_or("<no identifier>"),
                    reason
                )),
                _ => None,
            })
            .collect()
    }

    /// Turn PARTIAL and FAILURE results into errors
    pub fn into_result(self) -> Result<BatchJobResult> {
        match self.state {
            BatchState::Success => Ok(self),
            BatchState::Partial => Err(UserSyncError::PartialBatch {
                job_id: self.job_id.to_string(),
                failed: self.failed_count(),
                total: self.outcomes.len(),
                details: self.errors(),
            }),
            BatchState::Failure => Err(UserSyncError::BatchFailed(format!(
                "job {}: {}",
                self.job_id,
                self.errors().join("; ")
            ))),
        }
    }
}

/// Lifecycle of a submitted job
#[derive(Debug, Clone)]
pub enum BatchJobStatus {
    Pending,
    Running { processed: usize, total: usize },
    Completed(BatchJobResult),
}

impl BatchJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchJobStatus::Completed(_))
    }
}
