use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::monitor::{QuiescenceMonitor, WaitOutcome};
use crate::scheduler::{JobId, JobStore};

#[derive(Clone)]
pub struct ApiState {
    pub store: JobStore,
    pub monitor: QuiescenceMonitor,
    /// Cancelled on server shutdown; ends in-flight waits
    pub shutdown: CancellationToken,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub repo_uri: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    #[serde(default)]
    pub repo_uri: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitResponse {
    pub outcome: String,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/jobs", get(list_jobs_handler).post(submit_job_handler))
        .route("/api/jobs/{id}", get(job_status_handler))
        .route("/api/jobs/{id}/logs", get(job_logs_handler))
        .route("/api/wait", get(wait_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until `state.shutdown` is cancelled.
pub async fn run_api(addr: SocketAddr, state: ApiState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind API server");
        e
    })?;
    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn submit_job_handler(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<JobRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected job request body");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    if req.repo_uri.is_empty() || req.commit.is_empty() || req.command.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: repo_uri, commit, and command are required",
        );
    }

    let job_id = state
        .store
        .submit(&req.repo_uri, &req.commit, &req.command)
        .await;

    (
        StatusCode::CREATED,
        Json(JobResponse {
            id: job_id.to_string(),
            ..Default::default()
        }),
    )
        .into_response()
}

async fn list_jobs_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let mut jobs: Vec<String> = state
        .store
        .list()
        .await
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    jobs.sort();

    Json(ListJobsResponse { jobs })
}

async fn job_status_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let detail = state.store.get_detail(&JobId::from(id)).await;

    Json(JobResponse {
        id: detail.id.to_string(),
        status: detail.status.to_string(),
        logs: Vec::new(),
        repo_uri: detail.repo_uri,
        commit: detail.commit,
        command: detail.command,
    })
}

async fn job_logs_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let job_id = JobId::from(id);
    let logs = state.store.get_logs(&job_id).await;

    Json(JobResponse {
        id: job_id.to_string(),
        logs,
        ..Default::default()
    })
}

/// Long-poll until all jobs finish. A client disconnect drops this future,
/// which stops the monitor.
async fn wait_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let outcome = state.monitor.wait(&state.shutdown).await;

    let status = match outcome {
        WaitOutcome::NoJobs | WaitOutcome::AllSucceeded | WaitOutcome::SomeFailed => {
            StatusCode::OK
        }
        WaitOutcome::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        WaitOutcome::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status,
        Json(WaitResponse {
            outcome: outcome.to_string(),
        }),
    )
}
