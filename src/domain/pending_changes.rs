use serde::Deserialize;
use serde::Serialize;

use super::NewsletterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedChange {
    pub newsletter_id: NewsletterId,
    pub action: ChangeAction,
}

/// Subscription changes a voter asked for, awaiting confirmation. At most one
/// change per newsletter; requesting again replaces the earlier action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RequestedChange>", into = "Vec<RequestedChange>")]
pub struct ChangeSet(Vec<RequestedChange>);

impl From<Vec<RequestedChange>> for ChangeSet {
    fn from(changes: Vec<RequestedChange>) -> Self {
        let mut set = Self::default();
        for change in changes {
            set.request(change.newsletter_id, change.action);
        }
        set
    }
}

impl From<ChangeSet> for Vec<RequestedChange> {
    fn from(set: ChangeSet) -> Self { set.0 }
}

impl ChangeSet {
    pub fn request(
        &mut self,
        newsletter_id: NewsletterId,
        action: ChangeAction,
    ) {
        match self.0.iter_mut().find(|c| c.newsletter_id == newsletter_id) {
            Some(c) => c.action = action,
            None => self.0.push(RequestedChange {
                newsletter_id,
                action,
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestedChange> { self.0.iter() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Serialized form, as stored in the `changes` column
    pub fn encode(&self) -> String {
        // a Vec of plain structs cannot fail to serialize
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

/// The decoded `changes` payload of a voter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChanges {
    /// No payload was ever set (or it was cleared)
    Empty,
    Requested(ChangeSet),
}

#[derive(thiserror::Error, Debug)]
pub enum PendingChangesError {
    #[error("Pending changes payload is corrupt")]
    Corrupt(#[source] serde_json::Error),
}

impl PendingChanges {
    pub fn decode(raw: Option<&str>) -> Result<Self, PendingChangesError> {
        match raw {
            None => Ok(Self::Empty),
            Some(raw) if raw.trim().is_empty() => Ok(Self::Empty),
            Some(raw) => serde_json::from_str(raw)
                .map(Self::Requested)
                .map_err(PendingChangesError::Corrupt),
        }
    }
}
