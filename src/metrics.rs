use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::{json, Value};

use crate::scrape::scheduler::{RunStatus, StatusSnapshot};

pub const SERVICE_NAME: &str = "free-events-scraper";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// A handle backed by a recorder that is not installed globally; for tests.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// `/health`, `/metrics` (Prometheus exposition) and `/status` (last run).
    pub fn router(&self, status: RunStatus) -> Router {
        let state = AppState {
            metrics: self.handle.clone(),
            status,
        };
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(render_metrics))
            .route("/status", get(run_status))
            .with_state(state)
    }
}

#[derive(Clone)]
struct AppState {
    metrics: PrometheusHandle,
    status: RunStatus,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

async fn run_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}
