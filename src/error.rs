use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserSyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Batch job {job_id} did not terminate within {waited_ms}ms")]
    Timeout { job_id: String, waited_ms: u64 },

    #[error("Batch job {job_id} partially failed: {failed} of {total} records failed")]
    PartialBatch {
        job_id: String,
        failed: usize,
        total: usize,
        details: Vec<String>,
    },

    #[error("Batch job failed: {0}")]
    BatchFailed(String),

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Direction {0} is already running")]
    AlreadyRunning(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl UserSyncError {
    /// Whether the next scheduled run may succeed without operator action
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UserSyncError::Connection(_)
                | UserSyncError::Timeout { .. }
                | UserSyncError::PartialBatch { .. }
                | UserSyncError::BatchFailed(_)
                | UserSyncError::Redis(_)
                | UserSyncError::AlreadyRunning(_)
        )
    }
}

impl From<reqwest::Error> for UserSyncError {
    fn from(err: reqwest::Error) -> Self {
        UserSyncError::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UserSyncError>;
