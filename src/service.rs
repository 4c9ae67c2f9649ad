use std::fmt::Debug;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;

use crate::configuration::VoterSettings;
use crate::domain::ChangeAction;
use crate::domain::FieldSchema;
use crate::domain::NewVoter;
use crate::domain::NewsletterId;
use crate::domain::PendingChanges;
use crate::domain::PendingChangesError;
use crate::domain::SubscriptionEntry;
use crate::domain::SubscriptionSource;
use crate::domain::SubscriptionStatus;
use crate::domain::VoterEmail;
use crate::domain::VoterId;
use crate::domain::VoterRecord;
use crate::events::BroadcastEventBus;
use crate::events::EventBus;
use crate::events::VoterEvent;
use crate::storage::InMemoryMailSpool;
use crate::storage::InMemoryUserDirectory;
use crate::storage::InMemoryVoterStore;
use crate::storage::MailSpool;
use crate::storage::PgMailSpool;
use crate::storage::PgUserDirectory;
use crate::storage::PgVoterStore;
use crate::storage::StorageError;
use crate::storage::UserDirectory;
use crate::storage::VoterStore;
use crate::synchronization::UserFieldSynchronizer;
use crate::utils::error_chain_fmt;

/// The host-side services a `VoterService` talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub voters: Arc<dyn VoterStore>,
    pub users: Arc<dyn UserDirectory>,
    pub mail_spool: Arc<dyn MailSpool>,
    pub events: Arc<dyn EventBus>,
}

impl Collaborators {
    pub fn in_memory() -> Self {
        Self {
            voters: Arc::new(InMemoryVoterStore::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
            mail_spool: Arc::new(InMemoryMailSpool::new()),
            events: Arc::new(BroadcastEventBus::default()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            voters: Arc::new(PgVoterStore::new(pool.clone())),
            users: Arc::new(PgUserDirectory::new(pool.clone())),
            mail_spool: Arc::new(PgMailSpool::new(pool)),
            events: Arc::new(BroadcastEventBus::default()),
        }
    }
}

#[derive(thiserror::Error)]
pub enum VoterError {
    #[error("Voter {0} not found")]
    NotFound(VoterId),
    #[error("{0}")]
    Validation(String),
    #[error("A voter with email {0} already exists")]
    Duplicate(String),
    #[error(transparent)]
    PendingChanges(#[from] PendingChangesError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Debug for VoterError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Voter lifecycle on top of the collaborators: creation (auto-link, pull,
/// persist, push), saving (persist, push), and subscription changes with
/// their side effects (mail spool cleanup, events).
pub struct VoterService {
    voters: Arc<dyn VoterStore>,
    mail_spool: Arc<dyn MailSpool>,
    events: Arc<dyn EventBus>,
    synchronizer: UserFieldSynchronizer,
    voter_schema: FieldSchema,
}

impl VoterService {
    pub fn new(
        collaborators: Collaborators,
        settings: &VoterSettings,
    ) -> Self {
        Self {
            voters: collaborators.voters,
            mail_spool: collaborators.mail_spool,
            events: collaborators.events,
            synchronizer: UserFieldSynchronizer::new(collaborators.users, settings),
            voter_schema: settings.voter_schema(),
        }
    }

    pub fn synchronizer(&self) -> &UserFieldSynchronizer { &self.synchronizer }

    /// Set a custom field, checking it against the voter schema. System
    /// fields have their own setters and cannot be written here.
    pub fn set_field(
        &self,
        voter: &mut VoterRecord,
        name: &str,
        value: Value,
    ) -> Result<(), VoterError> {
        let def = self
            .voter_schema
            .get(name)
            .filter(|f| f.is_custom())
            .ok_or_else(|| VoterError::Validation(format!("Unknown field: {name:?}")))?;
        if !def.field_type.accepts(&value) {
            return Err(VoterError::Validation(format!(
                "Field {name:?} expects {:?}, got {value}",
                def.field_type
            )));
        }
        voter.set_field(name, value);
        Ok(())
    }

    #[tracing::instrument(
        name = "Creating voter",
        skip(self, new),
        fields(voter_email = %new.email, voter_id = tracing::field::Empty)
    )]
    pub async fn create(
        &self,
        new: NewVoter,
    ) -> Result<VoterRecord, VoterError> {
        if self.voters.find_by_email(&new.email).await?.is_some() {
            return Err(VoterError::Duplicate(new.email.to_string()));
        }

        let mut voter = VoterRecord::new(new.email);
        voter.set_user_id(new.user_id);
        voter.set_status(new.status);
        voter.set_langcode(new.langcode);
        for (name, value) in new.fields {
            self.set_field(&mut voter, &name, value)?;
        }

        // shared fields of an existing user take precedence over the ones
        // submitted with the voter
        self.synchronizer.post_create(&mut voter).await?;
        self.save(&mut voter).await?;

        if let Some(id) = voter.id() {
            tracing::Span::current().record("voter_id", tracing::field::display(id));
        }
        Ok(voter)
    }

    pub async fn load(
        &self,
        id: VoterId,
    ) -> Result<VoterRecord, VoterError> {
        self.voters
            .load(id)
            .await?
            .ok_or(VoterError::NotFound(id))
    }

    pub async fn find_by_email(
        &self,
        email: &VoterEmail,
    ) -> Result<Option<VoterRecord>, VoterError> {
        Ok(self.voters.find_by_email(email).await?)
    }

    /// Change the voter's email (not persisted). Fails if another voter
    /// already has it.
    pub async fn change_email(
        &self,
        voter: &mut VoterRecord,
        email: VoterEmail,
    ) -> Result<(), VoterError> {
        if let Some(other) = self.voters.find_by_email(&email).await? {
            if other.id() != voter.id() {
                return Err(VoterError::Duplicate(email.to_string()));
            }
        }
        voter.set_email(email);
        Ok(())
    }

    /// Persist, then push shared fields to the linked user. A failed push is
    /// an error even though the voter itself was saved.
    #[tracing::instrument(name = "Saving voter", skip(self, voter), fields(voter_id = ?voter.id()))]
    pub async fn save(
        &self,
        voter: &mut VoterRecord,
    ) -> Result<(), VoterError> {
        self.voters.save(voter).await?;
        self.synchronizer.post_save(voter).await?;
        Ok(())
    }

    /// Record `status` for the newsletter (not persisted). Every write that
    /// leaves the voter subscribed publishes a "subscribed" event.
    pub fn subscribe(
        &self,
        voter: &mut VoterRecord,
        newsletter_id: NewsletterId,
        status: SubscriptionStatus,
        source: SubscriptionSource,
        timestamp: DateTime<Utc>,
    ) -> SubscriptionEntry {
        let entry = voter
            .subscribe(newsletter_id, status, source, timestamp)
            .clone();
        self.notify_subscribed(voter, &entry);
        entry
    }

    /// Mark the newsletter unsubscribed (not persisted), drop any mail still
    /// queued for it, and publish an "unsubscribed" event. Failing to clear
    /// the spool is logged and otherwise ignored.
    #[tracing::instrument(name = "Unsubscribing voter", skip(self, voter, source, timestamp), fields(voter_id = ?voter.id()))]
    pub async fn unsubscribe(
        &self,
        voter: &mut VoterRecord,
        newsletter_id: NewsletterId,
        source: SubscriptionSource,
        timestamp: DateTime<Utc>,
    ) -> SubscriptionEntry {
        let entry = voter
            .unsubscribe(newsletter_id, source, timestamp)
            .clone();
        self.notify_unsubscribed(voter, newsletter_id).await;
        entry
    }

    /// Like `subscribe`, but the voter is saved before the event is
    /// published. Nothing is published if the save fails.
    #[tracing::instrument(name = "Saving subscription", skip(self, voter, source, timestamp), fields(voter_id = ?voter.id()))]
    pub async fn subscribe_and_save(
        &self,
        voter: &mut VoterRecord,
        newsletter_id: NewsletterId,
        status: SubscriptionStatus,
        source: SubscriptionSource,
        timestamp: DateTime<Utc>,
    ) -> Result<SubscriptionEntry, VoterError> {
        let entry = voter
            .subscribe(newsletter_id, status, source, timestamp)
            .clone();
        self.save(voter).await?;
        self.notify_subscribed(voter, &entry);
        Ok(entry)
    }

    /// Like `unsubscribe`, but the voter is saved first. If the save fails,
    /// spooled mail is kept and nothing is published.
    #[tracing::instrument(name = "Saving unsubscription", skip(self, voter, source, timestamp), fields(voter_id = ?voter.id()))]
    pub async fn unsubscribe_and_save(
        &self,
        voter: &mut VoterRecord,
        newsletter_id: NewsletterId,
        source: SubscriptionSource,
        timestamp: DateTime<Utc>,
    ) -> Result<SubscriptionEntry, VoterError> {
        let entry = voter
            .unsubscribe(newsletter_id, source, timestamp)
            .clone();
        self.save(voter).await?;
        self.notify_unsubscribed(voter, newsletter_id).await;
        Ok(entry)
    }

    /// Apply the voter's pending changes, clear them and save the voter.
    /// Events and spool cleanup follow the save. Returns the number of
    /// changes applied.
    #[tracing::instrument(name = "Confirming pending changes", skip(self, voter), fields(voter_id = ?voter.id()))]
    pub async fn confirm_changes(
        &self,
        voter: &mut VoterRecord,
    ) -> Result<usize, VoterError> {
        let changes = match voter.changes()? {
            PendingChanges::Empty => return Ok(0),
            PendingChanges::Requested(changes) => changes,
        };
        let source =
            SubscriptionSource::parse("confirmation".to_string()).map_err(VoterError::Validation)?;
        let now = Utc::now();

        let mut applied = vec![];
        for change in changes.iter() {
            let entry = match change.action {
                ChangeAction::Subscribe => voter.subscribe(
                    change.newsletter_id,
                    SubscriptionStatus::Subscribed,
                    source.clone(),
                    now,
                ),
                ChangeAction::Unsubscribe => {
                    voter.unsubscribe(change.newsletter_id, source.clone(), now)
                }
            };
            applied.push(entry.clone());
        }
        voter.clear_changes();
        self.save(voter).await?;

        for entry in &applied {
            match entry.status {
                SubscriptionStatus::Unsubscribed => {
                    self.notify_unsubscribed(voter, entry.newsletter_id).await
                }
                _ => self.notify_subscribed(voter, entry),
            }
        }
        Ok(applied.len())
    }

    fn notify_subscribed(
        &self,
        voter: &VoterRecord,
        entry: &SubscriptionEntry,
    ) {
        if entry.is_subscribed() {
            self.events.publish(VoterEvent::Subscribed {
                voter: voter.clone(),
                newsletter_id: entry.newsletter_id,
            });
        }
    }

    async fn notify_unsubscribed(
        &self,
        voter: &VoterRecord,
        newsletter_id: NewsletterId,
    ) {
        // an unsaved voter cannot have spooled mail
        if let Some(id) = voter.id() {
            match self.mail_spool.delete_queued_mail(id, newsletter_id).await {
                Ok(deleted) => tracing::debug!(deleted, "cleared spooled mail"),
                Err(e) => tracing::warn!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "could not clear spooled mail, continuing"
                ),
            }
        }

        self.events.publish(VoterEvent::Unsubscribed {
            voter: voter.clone(),
            newsletter_id,
        });
    }
}
