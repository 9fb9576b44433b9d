use crate::config::SharedRuntimeConfig;
use crate::scheduler::{SamplerStatus, SensorPoller};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// State for the admin API.
pub struct AdminAppState {
    pub runtime_config: SharedRuntimeConfig,
    pub pollers: Vec<SensorPoller>,
}

/// Partial update body. Only fields present in the request are changed.
#[derive(Deserialize)]
pub struct RuntimeConfigUpdate {
    pub polling_interval_ms: Option<u64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Per-sensor polling status
#[derive(Serialize)]
pub struct PollerResponse {
    pub sensor: String,
    pub running: bool,
    pub interval_ms: Option<u64>,
    #[serde(flatten)]
    pub status: SamplerStatus,
}

pub fn create_admin_router(state: Arc<AdminAppState>) -> Router {
    Router::new()
        .route("/api/admin/config", get(get_config).put(put_config))
        .route("/api/admin/polling", get(get_polling))
        .with_state(state)
}

/// GET /api/admin/config - returns current RuntimeConfig.
async fn get_config(State(state): State<Arc<AdminAppState>>) -> Response {
    let cfg = state
        .runtime_config
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(cfg).into_response()
}

/// PUT /api/admin/config - partial update. A new polling interval
/// reschedules every running poller.
async fn put_config(
    State(state): State<Arc<AdminAppState>>,
    Json(update): Json<RuntimeConfigUpdate>,
) -> Response {
    if update.polling_interval_ms == Some(0) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "polling_interval_ms must be positive".to_string(),
            }),
        )
            .into_response();
    }

    let (cfg, changed_interval) = {
        let mut cfg = state
            .runtime_config
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut changed_interval = None;
        if let Some(v) = update.polling_interval_ms {
            if v != cfg.polling_interval_ms {
                cfg.polling_interval_ms = v;
                changed_interval = Some(v);
            }
        }
        (cfg.clone(), changed_interval)
    };

    if let Some(ms) = changed_interval {
        info!(interval_ms = ms, "Polling interval updated");
        for poller in &state.pollers {
            if !poller.scheduler.is_running() {
                continue;
            }
            if let Err(e) = poller.scheduler.reschedule(Duration::from_millis(ms)) {
                warn!(sensor = %poller.sensor(), error = %e, "Reschedule failed");
            }
        }
    }

    Json(cfg).into_response()
}

/// GET /api/admin/polling - sampler status per polled sensor
async fn get_polling(State(state): State<Arc<AdminAppState>>) -> Json<Vec<PollerResponse>> {
    let pollers = state
        .pollers
        .iter()
        .map(|poller| PollerResponse {
            sensor: poller.sensor().to_string(),
            running: poller.scheduler.is_running(),
            interval_ms: poller.scheduler.interval().map(|d| d.as_millis() as u64),
            status: poller.sampler.status(),
        })
        .collect();
    Json(pollers)
}
