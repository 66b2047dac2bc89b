//! Event types emitted to consumers of the update stream.

use serde::Serialize;
use std::collections::BTreeSet;

/// Events emitted by the poll loop.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LongPollEvent {
    /// One or more messages were added, removed or changed.
    MessageChanged,

    /// Presence of the listed users changed.
    PresenceChanged {
        /// Unsigned user ids, deduplicated
        user_ids: BTreeSet<u64>,
    },

    /// The server can no longer resume from the client's cursor; cached
    /// message state must be discarded and reloaded.
    HistoryReset,
}

impl LongPollEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageChanged => EventKind::MessageChanged,
            Self::PresenceChanged { .. } => EventKind::PresenceChanged,
            Self::HistoryReset => EventKind::HistoryReset,
        }
    }

    /// Comma-joined user ids of a presence event, e.g. `"12,40"`.
    pub fn joined_user_ids(&self) -> Option<String> {
        match self {
            Self::PresenceChanged { user_ids } => Some(
                user_ids
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        }
    }
}

/// Event channel a consumer can subscribe to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventKind {
    MessageChanged,
    PresenceChanged,
    HistoryReset,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [EventKind; 3] = [
        EventKind::MessageChanged,
        EventKind::PresenceChanged,
        EventKind::HistoryReset,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind() {
        assert_eq!(LongPollEvent::MessageChanged.kind(), EventKind::MessageChanged);
        assert_eq!(LongPollEvent::HistoryReset.kind(), EventKind::HistoryReset);
        let presence = LongPollEvent::PresenceChanged {
            user_ids: BTreeSet::from([1]),
        };
        assert_eq!(presence.kind(), EventKind::PresenceChanged);
    }

    #[test]
    fn test_joined_user_ids() {
        let presence = LongPollEvent::PresenceChanged {
            user_ids: BTreeSet::from([40, 12, 7]),
        };
        assert_eq!(presence.joined_user_ids().as_deref(), Some("7,12,40"));
        assert_eq!(LongPollEvent::MessageChanged.joined_user_ids(), None);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(LongPollEvent::PresenceChanged {
            user_ids: BTreeSet::from([3]),
        })
        .unwrap();
        assert_eq!(json["type"], "presence_changed");
        assert_eq!(json["user_ids"], serde_json::json!([3]));
    }
}
