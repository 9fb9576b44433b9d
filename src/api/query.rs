use crate::state::{Actuator, Entity, SensorRegistry};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for query API
pub struct QueryAppState {
    pub registry: Arc<SensorRegistry>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create query API router
pub fn create_query_router(state: Arc<QueryAppState>) -> Router {
    Router::new()
        .route("/api/state/sensors", get(list_sensors))
        .route("/api/state/sensors/:name", get(get_sensor))
        .route("/api/state/actuators", get(list_actuators))
        .route("/api/state/actuators/:name", get(get_actuator))
        .with_state(state)
}

/// GET /api/state/sensors - All sensors in registration order
async fn list_sensors(State(state): State<Arc<QueryAppState>>) -> Json<Vec<Entity>> {
    Json(state.registry.sensors())
}

/// GET /api/state/sensors/:name
async fn get_sensor(
    State(state): State<Arc<QueryAppState>>,
    Path(name): Path<String>,
) -> Result<Json<Entity>, QueryError> {
    state
        .registry
        .sensor(&name)
        .map(Json)
        .ok_or(QueryError::NotFound("Sensor not found"))
}

/// GET /api/state/actuators
async fn list_actuators(State(state): State<Arc<QueryAppState>>) -> Json<Vec<Actuator>> {
    Json(state.registry.actuators())
}

/// GET /api/state/actuators/:name
async fn get_actuator(
    State(state): State<Arc<QueryAppState>>,
    Path(name): Path<String>,
) -> Result<Json<Actuator>, QueryError> {
    state
        .registry
        .actuator(&name)
        .map(Json)
        .ok_or(QueryError::NotFound("Actuator not found"))
}

/// Query error types
#[derive(Debug)]
enum QueryError {
    NotFound(&'static str),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            QueryError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
        });

        (status, body).into_response()
    }
}
