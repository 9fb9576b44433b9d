use crate::bridge::topic::to_subject;
use crate::bridge::MessageBus;
use crate::config::BridgeConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

/// Core NATS connection used by the bridge
#[derive(Clone)]
pub struct NatsClient {
    client: async_nats::Client,
}

impl NatsClient {
    pub async fn connect(config: &BridgeConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        Ok(Self { client })
    }

    /// Get underlying NATS client
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl MessageBus for NatsClient {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let subject = to_subject(topic);
        debug!(subject = %subject, payload = %payload, "Publishing to NATS");

        self.client
            .publish(subject.clone(), payload.to_string().into())
            .await
            .context(format!("Failed to publish to subject '{}'", subject))?;

        Ok(())
    }
}
