// SPDX-License-Identifier: Apache-2.0
//! In-process change notification over a broadcast channel.

use spoolman_model::{utc_now_seconds, ChangeEvent, EventType, ResourceKind};
use tokio::sync::broadcast;
use tracing::error;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn publish_record<T: serde::Serialize>(
        &self,
        event_type: EventType,
        resource: ResourceKind,
        item_key: impl Into<String>,
        record: &T,
    ) {
        let payload = match serde_json::to_value(record) {
            Ok(payload) => payload,
            Err(e) => {
                error!(resource = resource.as_str(), error = %e, "failed to serialize event payload");
                return;
            }
        };
        self.publish(ChangeEvent {
            event_type,
            resource,
            date: utc_now_seconds(),
            payload,
            item_key: item_key.into(),
        });
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}
