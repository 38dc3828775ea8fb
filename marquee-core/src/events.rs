use async_trait::async_trait;
use serde::Serialize;

use crate::CoreResult;

/// Outbound domain event bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> CoreResult<()>;
}

/// Serializes and publishes an event. Failures are logged, never returned:
/// events are notifications about state that is already committed.
pub async fn publish_json<T: Serialize + Sync>(
    publisher: &dyn EventPublisher,
    topic: &str,
    key: &str,
    event: &T,
) {
    let payload = match serde_json::to_vec(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("Failed to serialize {} event: {}", topic, e);
            return;
        }
    };

    if let Err(e) = publisher.publish(topic, key, &payload).await {
        tracing::warn!("Failed to publish {} event for {}: {}", topic, key, e);
    }
}
