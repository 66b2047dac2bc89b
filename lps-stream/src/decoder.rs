//! Decoding of raw update records.
//!
//! Every record is classified by its leading opcode. Decoding never fails:
//! the server may introduce opcodes this client does not know yet, and one
//! malformed record must not cost the rest of the batch.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::event::LongPollEvent;
use crate::types::UpdateRecord;

/// Message added, deleted, re-flagged or read; chat parameters changed.
const MESSAGE_OPCODES: [i64; 8] = [0, 1, 2, 3, 4, 6, 7, 51];

/// Friend went online (8) or offline (9); field 1 is the negated user id.
const PRESENCE_OPCODES: [i64; 2] = [8, 9];

/// Typing (61, 62), call (70), unread counter (80), notification settings (114).
const IGNORED_OPCODES: [i64; 5] = [61, 62, 70, 80, 114];

/// Classification of a single update record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UpdateKind {
    /// Contributes to the batch's message-changed count
    MessageChanged,
    /// Presence changed for this (unsigned) user id
    PresenceChanged(u64),
    /// Known opcode that produces no event
    Ignored,
    /// Unknown opcode or malformed record
    Unrecognized,
}

/// Result of decoding one batch of updates.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DecodedBatch {
    /// Number of records that touched messages
    pub message_changed_count: usize,
    /// Users whose presence changed, sign normalized away
    pub affected_user_ids: BTreeSet<u64>,
    /// Records that could not be classified, in input order
    pub unrecognized: Vec<UpdateRecord>,
}

impl DecodedBatch {
    /// Coalesce the batch into consumer events.
    ///
    /// At most one `MessageChanged` followed by at most one `PresenceChanged`.
    pub fn events(&self) -> Vec<LongPollEvent> {
        let mut events = Vec::with_capacity(2);
        if self.message_changed_count > 0 {
            events.push(LongPollEvent::MessageChanged);
        }
        if !self.affected_user_ids.is_empty() {
            events.push(LongPollEvent::PresenceChanged {
                user_ids: self.affected_user_ids.clone(),
            });
        }
        events
    }

    /// True when the batch produces no events and has nothing to report.
    pub fn is_empty(&self) -> bool {
        self.message_changed_count == 0
            && self.affected_user_ids.is_empty()
            && self.unrecognized.is_empty()
    }
}

/// Classify a single update record.
pub fn classify_update(record: &UpdateRecord) -> UpdateKind {
    let Some(opcode) = record.opcode() else {
        return UpdateKind::Unrecognized;
    };

    if MESSAGE_OPCODES.contains(&opcode) {
        UpdateKind::MessageChanged
    } else if PRESENCE_OPCODES.contains(&opcode) {
        match record.field(1).and_then(user_id) {
            Some(id) => UpdateKind::PresenceChanged(id),
            None => UpdateKind::Unrecognized,
        }
    } else if IGNORED_OPCODES.contains(&opcode) {
        UpdateKind::Ignored
    } else {
        UpdateKind::Unrecognized
    }
}

/// Decode a batch of update records.
pub fn decode(updates: &[UpdateRecord]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();

    for record in updates {
        match classify_update(record) {
            UpdateKind::MessageChanged => batch.message_changed_count += 1,
            UpdateKind::PresenceChanged(id) => {
                batch.affected_user_ids.insert(id);
            }
            UpdateKind::Ignored => {}
            UpdateKind::Unrecognized => batch.unrecognized.push(record.clone()),
        }
    }

    batch
}

/// Absolute user id from a presence record field.
fn user_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_i64().map(i64::unsigned_abs),
        Value::String(s) => s.trim().parse::<i64>().ok().map(i64::unsigned_abs),
        _ => None,
    }
}
