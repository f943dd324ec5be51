//! HTTP surface: SSE run streams and run history.
//!
//! Endpoints:
//! - `GET  /api/run?competitor=&mode=&fresh=1` streams a run (or its replay)
//! - `POST /api/run` with `{competitor, mode}` always streams a fresh run
//! - `GET  /api/history[?id=]` lists recent runs or returns one record
//! - `GET  /health`

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};
use tracing::{debug, info};

use crate::core::{Orchestrator, RunOptions};
use crate::domain::Topology;

type AppState = Arc<Orchestrator>;

#[derive(Debug, Default, Deserialize)]
struct RunQuery {
    competitor: Option<String>,
    mode: Option<String>,
    fresh: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RunBody {
    competitor: Option<String>,
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    id: Option<String>,
}

/// Build the router over a shared orchestrator
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/run", get(run_stream_handler).post(run_post_handler))
        .route("/api/history", get(history_handler))
        .route("/health", get(health_handler))
        .with_state(orchestrator)
}

/// Bind and serve until the process exits
pub async fn run_server(address: &str, orchestrator: Arc<Orchestrator>) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;

    info!("Server listening on http://{}", address);

    axum::serve(listener, router(orchestrator))
        .await
        .context("Server error")
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Validate the competitor and mode shared by both run endpoints
fn parse_run_request(
    competitor: Option<String>,
    mode: Option<String>,
) -> Result<(String, Topology), Response> {
    let competitor = competitor.unwrap_or_default().trim().to_string();
    if competitor.is_empty() {
        return Err(bad_request("Missing competitor"));
    }
    let topology = match mode.as_deref() {
        None => Topology::Sequential,
        Some(raw) => raw.parse().map_err(|_| bad_request("Invalid mode"))?,
    };
    Ok((competitor, topology))
}

/// Start the run on its own task and stream its frames as the body
fn stream_run(
    orchestrator: AppState,
    competitor: String,
    topology: Topology,
    options: RunOptions,
) -> Response {
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let outcome = orchestrator
            .start_run(&competitor, topology, &tx, options)
            .await;
        debug!(?outcome, "stream finished");
    });

    let body = Body::from_stream(UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
        ],
        body,
    )
        .into_response()
}

async fn run_stream_handler(
    State(orchestrator): State<AppState>,
    Query(query): Query<RunQuery>,
) -> Response {
    let (competitor, topology) = match parse_run_request(query.competitor, query.mode) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let options = RunOptions {
        bypass_cache: query.fresh.as_deref() == Some("1"),
    };
    stream_run(orchestrator, competitor, topology, options)
}

async fn run_post_handler(State(orchestrator): State<AppState>, body: Bytes) -> Response {
    let body: RunBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(_) => return bad_request("Invalid JSON body"),
    };
    let (competitor, topology) = match parse_run_request(body.competitor, body.mode) {
        Ok(request) => request,
        Err(response) => return response,
    };
    stream_run(
        orchestrator,
        competitor,
        topology,
        RunOptions { bypass_cache: true },
    )
}

async fn history_handler(
    State(orchestrator): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let id = query.id.unwrap_or_default();
    let id = id.trim();
    if id.is_empty() {
        return Json(orchestrator.list_recent_runs()).into_response();
    }

    match orchestrator.get_run(id) {
        Some(record) => Json(record.as_ref().clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response(),
    }
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
