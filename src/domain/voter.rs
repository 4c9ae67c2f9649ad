use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use uuid::Uuid;

use super::ChangeSet;
use super::FieldDefinition;
use super::FieldType;
use super::NewsletterId;
use super::PendingChanges;
use super::PendingChangesError;
use super::SubscriptionEntry;
use super::SubscriptionSource;
use super::SubscriptionStatus;
use super::Subscriptions;
use super::UserId;
use super::VoterEmail;

/// Storage-assigned primary key of a voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VoterId(pub i64);

impl std::fmt::Display for VoterId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything a store needs to hand back a previously saved voter. Stores
/// build one of these from their rows and call `VoterRecord::restore`.
pub struct StoredVoter {
    pub id: VoterId,
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub user_id: Option<UserId>,
    pub status: bool,
    pub langcode: Option<String>,
    pub changes: Option<String>,
    pub fields: Map<String, Value>,
    pub subscriptions: Subscriptions,
}

/// A newsletter subscriber ("voter").
///
/// `id`, `uuid` and `created_at` are assigned by the store on first save and
/// never change afterwards; a record without an id has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoterRecord {
    id: Option<VoterId>,
    uuid: Option<Uuid>,
    created_at: Option<DateTime<Utc>>,
    // kept raw: the host may hand us addresses that no longer parse, and a
    // broken address must not make the whole record unloadable
    email: String,
    user_id: Option<UserId>,
    status: bool,
    langcode: Option<String>,
    // serialized `ChangeSet`; see `changes`
    #[serde(skip)]
    changes: Option<String>,
    fields: Map<String, Value>,
    subscriptions: Subscriptions,
}

impl VoterRecord {
    /// A new, unsaved, active voter with no linked user.
    pub fn new(email: VoterEmail) -> Self {
        Self {
            id: None,
            uuid: None,
            created_at: None,
            email: email.as_ref().to_string(),
            user_id: None,
            status: true,
            langcode: None,
            changes: None,
            fields: Map::new(),
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn restore(stored: StoredVoter) -> Self {
        Self {
            id: Some(stored.id),
            uuid: Some(stored.uuid),
            created_at: Some(stored.created_at),
            email: stored.email,
            user_id: stored.user_id,
            status: stored.status,
            langcode: stored.langcode,
            changes: stored.changes,
            fields: stored.fields,
            subscriptions: stored.subscriptions,
        }
    }

    /// Fixed system fields of every voter. None of these take part in field
    /// synchronization.
    pub fn base_field_definitions() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::base("id", FieldType::Integer).read_only(),
            FieldDefinition::base("uuid", FieldType::Uuid).read_only(),
            FieldDefinition::base("status", FieldType::Boolean),
            FieldDefinition::base("mail", FieldType::Email).required(),
            FieldDefinition::base("uid", FieldType::EntityReference),
            FieldDefinition::base("langcode", FieldType::Language),
            FieldDefinition::base("changes", FieldType::StringLong),
            FieldDefinition::base("created", FieldType::Timestamp).read_only(),
        ]
    }

    /// Called by a store on first save. Fails if the record already has an
    /// identity.
    pub fn assign_identity(
        &mut self,
        id: VoterId,
        uuid: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<(), String> {
        if let Some(existing) = self.id {
            return Err(format!("Voter {existing} already has an identity"));
        }
        self.id = Some(id);
        self.uuid = Some(uuid);
        self.created_at = Some(created_at);
        Ok(())
    }

    pub fn id(&self) -> Option<VoterId> { self.id }

    pub fn uuid(&self) -> Option<Uuid> { self.uuid }

    pub fn created_at(&self) -> Option<DateTime<Utc>> { self.created_at }

    pub fn is_new(&self) -> bool { self.id.is_none() }

    pub fn email(&self) -> &str { &self.email }

    /// `None` if the stored address is empty or malformed
    pub fn parsed_email(&self) -> Option<VoterEmail> { VoterEmail::parse(self.email.clone()).ok() }

    pub fn set_email(
        &mut self,
        email: VoterEmail,
    ) {
        self.email = email.as_ref().to_string();
    }

    pub fn user_id(&self) -> Option<UserId> { self.user_id }

    pub fn set_user_id(
        &mut self,
        user_id: Option<UserId>,
    ) {
        self.user_id = user_id;
    }

    pub fn status(&self) -> bool { self.status }

    pub fn set_status(
        &mut self,
        status: bool,
    ) {
        self.status = status;
    }

    pub fn langcode(&self) -> Option<&str> { self.langcode.as_deref() }

    pub fn set_langcode(
        &mut self,
        langcode: Option<String>,
    ) {
        self.langcode = langcode;
    }

    /// Decoded pending changes. A payload that was never set is `Empty`; a
    /// payload that cannot be decoded is an error, never `Empty`.
    pub fn changes(&self) -> Result<PendingChanges, PendingChangesError> {
        PendingChanges::decode(self.changes.as_deref())
    }

    /// Setting an empty change set clears the payload.
    pub fn set_changes(
        &mut self,
        changes: &ChangeSet,
    ) {
        self.changes = match changes.is_empty() {
            true => None,
            false => Some(changes.encode()),
        };
    }

    pub fn clear_changes(&mut self) { self.changes = None; }

    /// Serialized payload, for stores
    pub fn raw_changes(&self) -> Option<&str> { self.changes.as_deref() }

    pub fn field(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(
        &mut self,
        name: &str,
        value: Value,
    ) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> { &self.fields }

    pub fn subscriptions(&self) -> &Subscriptions { &self.subscriptions }

    pub fn get_subscription(
        &self,
        newsletter_id: NewsletterId,
    ) -> Option<&SubscriptionEntry> {
        self.subscriptions.get(newsletter_id)
    }

    pub fn subscribed_newsletter_ids(&self) -> Vec<NewsletterId> {
        self.subscriptions.subscribed_ids()
    }

    pub fn is_subscribed(
        &self,
        newsletter_id: NewsletterId,
    ) -> bool {
        self.get_subscription(newsletter_id)
            .is_some_and(SubscriptionEntry::is_subscribed)
    }

    /// Whether the latest status for this newsletter is the voter marker
    /// (`Pending`). No entry means not a voter.
    pub fn is_voter(
        &self,
        newsletter_id: NewsletterId,
    ) -> bool {
        self.get_subscription(newsletter_id)
            .is_some_and(SubscriptionEntry::is_voter)
    }

    /// Record a subscription status for a newsletter. Events are the caller's
    /// business (see `VoterService::subscribe`).
    pub fn subscribe(
        &mut self,
        newsletter_id: NewsletterId,
        status: SubscriptionStatus,
        source: SubscriptionSource,
        timestamp: DateTime<Utc>,
    ) -> &SubscriptionEntry {
        self.subscriptions
            .upsert(newsletter_id, status, source, timestamp)
    }

    pub fn unsubscribe(
        &mut self,
        newsletter_id: NewsletterId,
        source: SubscriptionSource,
        timestamp: DateTime<Utc>,
    ) -> &SubscriptionEntry {
        self.subscriptions.upsert(
            newsletter_id,
            SubscriptionStatus::Unsubscribed,
            source,
            timestamp,
        )
    }
}
