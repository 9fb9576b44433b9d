// Entity state, change notification
pub mod state;

// Hardware access
pub mod driver;

// Actuator command routing
pub mod dispatch;

// Periodic sensor polling
pub mod scheduler;

// Addressable, observable resources
pub mod resource;

// HTTP and WebSocket APIs
pub mod api;

// WebSocket observe subscriptions
pub mod subscription;

// NATS message bus bridge
pub mod bridge;

// File, environment and runtime configuration
pub mod config;
