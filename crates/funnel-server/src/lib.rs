//! HTTP front end for the mock lines.
//!
//! - `/{line}/api/{resource}`: one simulated request against `line`
//! - `/admin/config`, `/admin/line/{line}`: read and replace line profiles
//! - `/admin/reset`, `/admin/reset/{line}`: clear metrics
//! - `/metrics/snapshot`: lifetime totals and the per-second series

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use chrono::{Local, SecondsFormat};
use funnel_core::{Funnel, FunnelError, LineId, LineProfile, MetricsTotals, Outcome, OutcomeKind, SeriesPoint};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub type AppState = Arc<Funnel>;

pub fn router(funnel: AppState) -> Router {
    Router::new()
        .route("/metrics/snapshot", get(metrics_snapshot))
        .route("/admin/config", get(get_config))
        .route("/admin/reset", post(reset_all))
        .route("/admin/reset/{line}", post(reset_line))
        .route("/admin/line/{line}", get(get_line).post(update_line))
        .route("/{line}/api/{resource}", any(dispatch))
        .with_state(funnel)
        .layer(middleware::from_fn(log_requests))
}

pub async fn serve<F>(listener: TcpListener, funnel: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(funnel))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let resp = next.run(req).await;
    info!(
        "{} {} {} {:?}",
        method,
        path,
        resp.status().as_u16(),
        start.elapsed()
    );
    resp
}

#[derive(Debug)]
pub enum ApiError {
    Funnel(FunnelError),
    BadRequest(String),
    Internal(String),
}

impl From<FunnelError> for ApiError {
    fn from(e: FunnelError) -> Self {
        ApiError::Funnel(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Funnel(FunnelError::UnknownLine(_)) => {
                (StatusCode::NOT_FOUND, "unknown line").into_response()
            }
            ApiError::Funnel(e @ FunnelError::InvalidProfile(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
            ApiError::Funnel(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Internal(msg) => {
                warn!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}

/// Run one simulation on its own task. Dropping the returned future (the
/// client went away) fires the request's cancellation token, and the task
/// still records its outcome.
pub async fn simulate_detached(funnel: AppState, line: String) -> Result<Outcome, ApiError> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let task = tokio::spawn(async move { funnel.simulate(&line, &cancel).await });
    let outcome = task
        .await
        .map_err(|e| ApiError::Internal(format!("simulation task failed: {e}")))??;

    guard.disarm();
    Ok(outcome)
}

#[derive(Debug, Serialize)]
struct MockPayload<'a> {
    ok: bool,
    line: &'a str,
    resource: &'a str,
    now: String,
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

fn status_for(outcome: &Outcome) -> (StatusCode, Option<&'static str>) {
    match outcome.kind {
        OutcomeKind::Success => (StatusCode::OK, None),
        OutcomeKind::Error => (StatusCode::BAD_GATEWAY, Some("simulated upstream error")),
        OutcomeKind::Timeout if outcome.cancelled => {
            (StatusCode::GATEWAY_TIMEOUT, Some("client cancelled"))
        }
        OutcomeKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, Some("simulated timeout")),
        OutcomeKind::Blocked => (StatusCode::SERVICE_UNAVAILABLE, Some("nightly window blocked")),
        OutcomeKind::Disabled => (StatusCode::SERVICE_UNAVAILABLE, Some("line disabled")),
    }
}

async fn dispatch(
    State(funnel): State<AppState>,
    Path((line, resource)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    funnel.line(&line)?;

    let outcome = simulate_detached(funnel, line.clone()).await?;
    let (status, error) = status_for(&outcome);
    let data = outcome.kind.is_success().then(|| {
        serde_json::json!({
            "message": "mock data",
            "resource": resource.as_str(),
            "hint": "response body shape is stable, feel free to ignore data for LB testing",
        })
    });

    let payload = MockPayload {
        ok: outcome.kind.is_success(),
        line: &line,
        resource: &resource,
        now: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        latency_ms: outcome.latency_ms,
        data,
        error,
    };
    let headers = [
        ("x-mock-line", line.clone()),
        ("x-mock-latency-ms", outcome.latency_ms.to_string()),
    ];
    Ok((status, headers, Json(payload)).into_response())
}

async fn get_config(State(funnel): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        lines: funnel.profiles(),
    })
}

#[derive(Debug, Serialize)]
struct ConfigResponse {
    lines: BTreeMap<LineId, LineProfile>,
}

async fn get_line(
    State(funnel): State<AppState>,
    Path(line): Path<String>,
) -> Result<Json<LineProfile>, ApiError> {
    let profile = funnel.profile(&line)?;
    Ok(Json(profile.as_ref().clone()))
}

async fn update_line(
    State(funnel): State<AppState>,
    Path(line): Path<String>,
    body: Bytes,
) -> Result<Json<LineProfile>, ApiError> {
    funnel.line(&line)?;
    let profile: LineProfile =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("invalid json".to_string()))?;
    let updated = funnel.update_profile(&line, profile)?;
    Ok(Json(updated.as_ref().clone()))
}

async fn reset_all(State(funnel): State<AppState>) -> StatusCode {
    funnel.reset_all();
    StatusCode::NO_CONTENT
}

async fn reset_line(
    State(funnel): State<AppState>,
    Path(line): Path<String>,
) -> Result<StatusCode, ApiError> {
    funnel.reset_line(&line)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Column-oriented series, the shape chart front ends poll.
#[derive(Debug, Default, Serialize)]
pub struct Series {
    pub sec: Vec<i64>,
    pub rps: Vec<u64>,
    pub latency_avg: Vec<u64>,
    pub success: Vec<u64>,
    pub errors: Vec<u64>,
    pub timeouts: Vec<u64>,
}

impl From<&[SeriesPoint]> for Series {
    fn from(points: &[SeriesPoint]) -> Self {
        let mut s = Series::default();
        for p in points {
            s.sec.push(p.sec);
            s.rps.push(p.requests_per_second);
            s.latency_avg.push(p.avg_latency_ms);
            s.success.push(p.success);
            s.errors.push(p.errors);
            s.timeouts.push(p.timeouts);
        }
        s
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub series: BTreeMap<LineId, Series>,
    pub totals: BTreeMap<LineId, MetricsTotals>,
}

async fn metrics_snapshot(State(funnel): State<AppState>) -> Json<SnapshotResponse> {
    let mut resp = SnapshotResponse {
        series: BTreeMap::new(),
        totals: BTreeMap::new(),
    };
    for (id, snap) in funnel.snapshot() {
        resp.series.insert(id.clone(), Series::from(snap.series.as_slice()));
        resp.totals.insert(id, snap.totals);
    }
    Json(resp)
}
