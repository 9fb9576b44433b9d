// HTTP and WebSocket APIs

pub mod admin;
pub mod query;
pub mod resources;
pub mod websocket;

pub use admin::{create_admin_router, AdminAppState};
pub use query::{create_query_router, QueryAppState};
pub use resources::{create_resource_router, ResourceAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};
