use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::NewsletterId;
use crate::domain::VoterRecord;

/// Something happened to a voter's subscription. Listeners get a snapshot of
/// the voter as it was right after the change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VoterEvent {
    Subscribed {
        voter: VoterRecord,
        newsletter_id: NewsletterId,
    },
    Unsubscribed {
        voter: VoterRecord,
        newsletter_id: NewsletterId,
    },
}

impl VoterEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
        }
    }

    pub fn newsletter_id(&self) -> NewsletterId {
        match self {
            Self::Subscribed { newsletter_id, .. } | Self::Unsubscribed { newsletter_id, .. } => {
                *newsletter_id
            }
        }
    }

    pub fn voter(&self) -> &VoterRecord {
        match self {
            Self::Subscribed { voter, .. } | Self::Unsubscribed { voter, .. } => voter,
        }
    }
}

/// Fire-and-forget publication of voter events.
pub trait EventBus: Send + Sync {
    fn publish(
        &self,
        event: VoterEvent,
    );
}

/// In-process event bus on top of a tokio broadcast channel. Publishing with
/// no listeners is not an error; the event is just logged and dropped.
pub struct BroadcastEventBus {
    sender: broadcast::Sender<VoterEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoterEvent> { self.sender.subscribe() }
}

impl Default for BroadcastEventBus {
    fn default() -> Self { Self::new(64) }
}

impl EventBus for BroadcastEventBus {
    fn publish(
        &self,
        event: VoterEvent,
    ) {
        tracing::info!(
            event = event.name(),
            voter_id = ?event.voter().id(),
            newsletter_id = %event.newsletter_id(),
            "publishing voter event"
        );
        // `send` only fails when nobody is listening
        let _ = self.sender.send(event);
    }
}
