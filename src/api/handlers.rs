use crate::api::ApiState;
use crate::error::UserSyncError;
use crate::models::{SyncDirection, Watermark};
use crate::pipeline::{DirectionStatus, HealthReport, RunReport};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: HealthReport,
}

/// One direction as reported by `GET /status`
#[derive(Debug, Serialize)]
pub struct DirectionStatusResponse {
    #[serde(flatten)]
    pub status: DirectionStatus,
    pub watermark: Option<Watermark>,
    pub scheduler_running: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub directions: Vec<DirectionStatusResponse>,
}

#[derive(Debug, Serialize)]
pub struct SchedulerResponse {
    pub direction: SyncDirection,
    pub running: bool,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&UserSyncError> for ErrorResponse {
    fn from(err: &UserSyncError) -> Self {
        Self {
            error: format!("{:?}", err),
            message: err.to_string(),
        }
    }
}

impl UserSyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UserSyncError::NotFound(_) => StatusCode::NOT_FOUND,
            UserSyncError::AlreadyRunning(_) => StatusCode::CONFLICT,
            UserSyncError::Validation(_) | UserSyncError::InvalidTimestamp(_) => {
                StatusCode::BAD_REQUEST
            }
            UserSyncError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            UserSyncError::Connection(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert error to response
impl IntoResponse for UserSyncError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

fn parse_direction(raw: &str) -> Result<SyncDirection, UserSyncError> {
    raw.parse::<SyncDirection>()
        .map_err(|_| UserSyncError::NotFound(format!("Direction '{}' not found", raw)))
}

/// Health of both systems and the watermark storage
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let components = state.orchestrator.health().await;
    let healthy = components.is_healthy();

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.uptime_seconds(),
            components,
        }),
    )
}

/// State, watermark and last report of each direction
pub async fn status(State(state): State<ApiState>) -> Result<Json<StatusResponse>, UserSyncError> {
    let watermarks = state.orchestrator.watermarks().await?;

    let mut directions = Vec::with_capacity(watermarks.len());
    for (direction, watermark) in watermarks {
        directions.push(DirectionStatusResponse {
            status: state.orchestrator.status(direction).await,
            watermark,
            scheduler_running: state.scheduler.is_running(direction).await,
        });
    }

    Ok(Json(StatusResponse { directions }))
}

/// Run one direction now, outside the schedule
pub async fn run_direction(
    State(state): State<ApiState>,
    Path(direction): Path<String>,
) -> Result<Json<RunReport>, UserSyncError> {
    let direction = parse_direction(&direction)?;
    info!("Manual run requested for '{}'", direction);
    let report = state.scheduler.run_once(direction).await?;
    Ok(Json(report))
}

/// Start a direction's periodic trigger
pub async fn start_direction(
    State(state): State<ApiState>,
    Path(direction): Path<String>,
) -> Result<Json<SchedulerResponse>, UserSyncError> {
    let direction = parse_direction(&direction)?;
    let started = state.scheduler.start(direction).await;

    Ok(Json(SchedulerResponse {
        direction,
        running: true,
        message: if started {
            format!("Scheduler for '{}' started", direction)
        } else {
            format!("Scheduler for '{}' was already running", direction)
        },
    }))
}

/// Stop a direction's periodic trigger; an in-flight run completes first
pub async fn stop_direction(
    State(state): State<ApiState>,
    Path(direction): Path<String>,
) -> Result<Json<SchedulerResponse>, UserSyncError> {
    let direction = parse_direction(&direction)?;
    let stopped = state.scheduler.stop(direction).await;

    Ok(Json(SchedulerResponse {
        direction,
        running: false,
        message: if stopped {
            format!("Scheduler for '{}' stopped", direction)
        } else {
            format!("Scheduler for '{}' was not running", direction)
        },
    }))
}

/// Drop a direction's watermark so the next run seeds it again
pub async fn reset_watermark(
    State(state): State<ApiState>,
    Path(direction): Path<String>,
) -> Result<StatusCode, UserSyncError> {
    let direction = parse_direction(&direction)?;
    state.orchestrator.reset_watermark(direction).await?;
    info!("Watermark for '{}' reset via API", direction);
    Ok(StatusCode::NO_CONTENT)
}

/// Prometheus metrics endpoint
pub async fn get_metrics() -> String {
    crate::metrics::gather_metrics()
}
