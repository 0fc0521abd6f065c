// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Added,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Vendor,
    Filament,
    Spool,
    Coil,
    Setting,
}

impl ResourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Filament => "filament",
            Self::Spool => "spool",
            Self::Coil => "coil",
            Self::Setting => "setting",
        }
    }
}

/// A change notification as sent to websocket subscribers. The payload is
/// the wire representation of the changed record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub resource: ResourceKind,
    pub date: DateTime<Utc>,
    pub payload: Value,
    /// Topic key for per-item subscriptions: the record id, or the setting
    /// key. Not part of the wire format.
    #[serde(skip)]
    pub item_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::utc_now_seconds;
    use serde_json::json;

    #[test]
    fn change_event_wire_shape_matches_contract() {
        let event = ChangeEvent {
            event_type: EventType::Added,
            resource: ResourceKind::Spool,
            date: utc_now_seconds(),
            payload: json!({"id": 7}),
            item_key: "7".to_string(),
        };
        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["type"], "added");
        assert_eq!(value["resource"], "spool");
        assert_eq!(value["payload"]["id"], 7);
        assert!(value.get("item_key").is_none());
    }
}
