use crate::resource::{ResourceError, ResourceTree, ResponseCode};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const LINK_FORMAT: &str = "application/link-format";

/// Shared state for the resource API
pub struct ResourceAppState {
    pub tree: Arc<ResourceTree>,
}

/// Create resource router
///
/// - `GET  /greenhouse/{sensors|actuators}/{name}` reads a value as text
/// - `PUT  /greenhouse/actuators/{name}` sends the body as a command
/// - `GET  /.well-known/core` lists all resources in CoRE link format
pub fn create_resource_router(state: Arc<ResourceAppState>) -> Router {
    Router::new()
        .route("/.well-known/core", get(discover))
        .route("/greenhouse", get(read_resource).put(write_resource))
        .route("/greenhouse/*path", get(read_resource).put(write_resource))
        .with_state(state)
}

/// GET /greenhouse/*path
async fn read_resource(State(state): State<Arc<ResourceAppState>>, uri: Uri) -> Response {
    match state.tree.handle_read(uri.path()) {
        Ok(value) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], value).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /greenhouse/*path
async fn write_resource(
    State(state): State<Arc<ResourceAppState>>,
    uri: Uri,
    body: String,
) -> Response {
    let command = body.trim();
    if command.is_empty() {
        return (StatusCode::BAD_REQUEST, [(header::CONTENT_TYPE, TEXT_PLAIN)], "empty command")
            .into_response();
    }

    match state.tree.handle_write(uri.path(), command).await {
        Ok(ResponseCode::Changed) => StatusCode::NO_CONTENT.into_response(),
        Ok(ResponseCode::Content) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /.well-known/core
async fn discover(State(state): State<Arc<ResourceAppState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, LINK_FORMAT)],
        state.tree.link_format(),
    )
        .into_response()
}

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        let status = match self {
            ResourceError::NotFound(_) => StatusCode::NOT_FOUND,
            ResourceError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ResourceError::ActuationFailed(_) => StatusCode::BAD_GATEWAY,
            ResourceError::SubscriptionError(_) => StatusCode::BAD_REQUEST,
        };

        (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], self.to_string()).into_response()
    }
}
