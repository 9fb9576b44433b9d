use crate::bridge::topic::from_subject;
use crate::bridge::TopicScheme;
use crate::dispatch::{CommandDispatcher, DispatchError};
use crate::state::StateUpdate;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Route one inbound bus message to the dispatcher.
///
/// Returns `None` when `topic` is not an actuator command topic.
pub async fn handle_command(
    dispatcher: &CommandDispatcher,
    topics: &TopicScheme,
    topic: &str,
    payload: &str,
) -> Option<Result<StateUpdate, DispatchError>> {
    let Some(actuator) = topics.parse_actuator_topic(topic) else {
        debug!(topic = %topic, "Ignoring non-command topic");
        return None;
    };

    let result = dispatcher.dispatch(actuator, payload.trim()).await;
    if let Err(e) = &result {
        warn!(topic = %topic, error = %e, "Bus command rejected");
    }
    Some(result)
}

/// Subscribe to actuator command subjects and dispatch until the
/// subscription ends.
pub async fn run_command_listener(
    client: async_nats::Client,
    topics: TopicScheme,
    dispatcher: Arc<CommandDispatcher>,
) -> Result<()> {
    let subject = topics.command_subject();
    let mut subscriber = client
        .subscribe(subject.clone())
        .await
        .context(format!("Failed to subscribe to '{}'", subject))?;

    info!(subject = %subject, "Listening for actuator commands");

    while let Some(message) = subscriber.next().await {
        let topic = from_subject(message.subject.as_str());
        let payload = match std::str::from_utf8(&message.payload) {
            Ok(payload) => payload,
            Err(_) => {
                warn!(topic = %topic, "Ignoring non-UTF-8 command payload");
                continue;
            }
        };

        handle_command(&dispatcher, &topics, &topic, payload).await;
    }

    info!(subject = %subject, "Command subscription closed");
    Ok(())
}
