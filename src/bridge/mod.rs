//! Message bus bridge.
//!
//! Outbound: sensor changes are published on `{prefix}sensors/{name}`.
//! Inbound: payloads on `{prefix}actuators/{name}` are dispatched as
//! actuator commands.

mod client;
mod commands;
mod publisher;
mod topic;

pub use client::NatsClient;
pub use commands::{handle_command, run_command_listener};
pub use publisher::{run_publisher, BridgeListener};
pub use topic::TopicScheme;

use anyhow::Result;
use async_trait::async_trait;

/// Outbound side of the external bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;
}
