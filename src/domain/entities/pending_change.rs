use crate::domain::entities::Guest;
use crate::domain::value_objects::{ChangeId, GuestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Update,
    Create,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Update => "update",
            ChangeAction::Create => "create",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation that the remote store has not acknowledged yet.
///
/// The payload is never edited after queuing, apart from swapping a local
/// placeholder ID once the remote store has assigned the real one. Entries
/// leave the queue only after a confirmed remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub change_id: ChangeId,
    pub action: ChangeAction,
    pub guest: Guest,
    pub queued_at: DateTime<Utc>,
}

impl PendingChange {
    pub fn new(action: ChangeAction, guest: Guest) -> Self {
        Self {
            change_id: ChangeId::generate(),
            action,
            guest,
            queued_at: Utc::now(),
        }
    }

    pub fn update(guest: Guest) -> Self {
        Self::new(ChangeAction::Update, guest)
    }

    pub fn create(guest: Guest) -> Self {
        Self::new(ChangeAction::Create, guest)
    }

    pub fn guest_id(&self) -> &GuestId {
        &self.guest.id
    }

    pub fn targets(&self, id: &GuestId) -> bool {
        &self.guest.id == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::TableNumber;

    #[test]
    fn serializes_action_in_snake_case() {
        let guest = Guest::new(
            GuestId::parse("rec1").unwrap(),
            "Alice",
            TableNumber::new(3).unwrap(),
        )
        .unwrap();
        let change = PendingChange::update(guest);
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["action"], "update");
        assert_eq!(json["guest"]["id"], "rec1");

        let decoded: PendingChange = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, change);
    }

    #[test]
    fn every_change_gets_its_own_id() {
        let guest = Guest::new(GuestId::local(), "Bob", TableNumber::default()).unwrap();
        let first = PendingChange::create(guest.clone());
        let second = PendingChange::create(guest);
        assert_ne!(first.change_id, second.change_id);
        assert_eq!(first.action, ChangeAction::Create);
    }
}
