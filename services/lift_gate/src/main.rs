//! Lift Gate — the HTTP entry point for auction lift telemetry.
//!
//! Accepts single events or batches on /collect, keeps the NDJSON log and
//! the in-memory aggregates behind one collector object, and serves the
//! tail and lift-metrics queries. Best-effort by design: past payload
//! parsing, nothing on the ingest path can fail a request.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lift_runtime::{Collector, MetricsReport, NdjsonEventLog};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Shared application state.
#[derive(Clone)]
struct AppState {
    collector: Arc<Collector>,
}

/// Process configuration, read once from the environment.
#[derive(Debug, Clone)]
struct GateConfig {
    port: u16,
    log_path: String,
    grace: Duration,
    sweep_interval: Duration,
}

impl GateConfig {
    fn from_env() -> Self {
        Self {
            port: env_parse("LIFT_PORT")
                .or_else(|| env_parse("PORT"))
                .unwrap_or(9090),
            log_path: std::env::var("LIFT_LOG")
                .or_else(|_| std::env::var("LOG"))
                .unwrap_or_else(|_| "./data/lift-events.ndjson".to_string()),
            grace: Duration::from_secs(env_parse("LIFT_GRACE_SECS").unwrap_or(30)),
            sweep_interval: Duration::from_secs(env_parse("LIFT_SWEEP_SECS").unwrap_or(5).max(1)),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = GateConfig::from_env();
    info!(?config, "starting lift gate");

    let log = Arc::new(NdjsonEventLog::new(&config.log_path));
    let collector = Arc::new(Collector::with_grace(log, config.grace));

    spawn_cache_sweeper(collector.clone(), config.sweep_interval);

    let app = build_router(AppState { collector });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, log = %config.log_path, "gate listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lift_runtime=debug,lift_gate=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// One sweeper for the whole process. Deadlines are also enforced lazily by
/// `get`, so the interval bounds memory, not correctness.
fn spawn_cache_sweeper(collector: Arc<Collector>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let evicted = collector.cache().sweep().await;
            if evicted > 0 {
                debug!(evicted, "label cache sweep");
            }
        }
    });
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/collect", post(collect))
        .route("/clear", post(clear))
        .route("/events", get(events))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Echo-origin CORS on every response; preflights short-circuit to 204
/// before routing.
async fn cors(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    response
}

/// POST /collect — ingest one event or a batch. 204 on success, 400 with a
/// text body when the payload is not JSON.
async fn collect(State(state): State<AppState>, body: Bytes) -> Response {
    match state.collector.collect(&body).await {
        Ok(summary) => {
            if summary.skipped > 0 {
                warn!(skipped = summary.skipped, "collect batch had non-object items");
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            debug!(error = %e, "rejecting unparsable collect body");
            (StatusCode::BAD_REQUEST, "invalid json").into_response()
        }
    }
}

/// POST /clear — zero the log, the aggregates and the label cache.
async fn clear(State(state): State<AppState>) -> StatusCode {
    state.collector.reset().await;
    info!("collector state cleared");
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    /// Tail size; non-numeric values fall back to the default.
    n: Option<String>,
}

/// GET /events?n=N — last N log records, oldest first.
async fn events(State(state): State<AppState>, Query(query): Query<EventsQuery>) -> Json<Vec<Value>> {
    let n = query.n.as_deref().and_then(|v| v.parse::<i64>().ok());
    Json(state.collector.tail(n).await)
}

/// GET /metrics — the lift report.
async fn metrics(State(state): State<AppState>) -> Json<MetricsReport> {
    Json(state.collector.metrics().await)
}

async fn healthz() -> Json<Value> {
    Json(json!({"ok": true}))
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
