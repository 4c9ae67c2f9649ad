//! Keeping voters and their linked user accounts in step.
//!
//! Fields that exist on both sides (same name, same declared type) are copied
//! from the user on voter creation, and pushed back to the user after every
//! voter save. Pushing saves the user account, and a host that mirrors user
//! saves back onto voters would then save the voter again, which would push
//! again, and so on. To break the cycle, the push runs inside a sync scope:
//! while it is active, `is_syncing` is true and `post_save` does nothing.
//!
//! The scope is task-local rather than a global flag. It is left as soon as
//! the push future completes (successfully or not) or is dropped, and other
//! requests running concurrently never observe it. Work spawned onto another
//! task from inside the scope does not inherit it.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::configuration::VoterSettings;
use crate::domain::compute_shared_field_names;
use crate::domain::UserRecord;
use crate::domain::VoterRecord;
use crate::storage::StorageError;
use crate::storage::UserDirectory;

tokio::task_local! {
    static SYNCING: ();
}

/// Whether the current task is inside a push to a user account.
pub fn is_syncing() -> bool { SYNCING.try_with(|_| ()).is_ok() }

/// Copy the user's value of every shared field onto the voter. Missing user
/// values clear the voter's.
pub fn pull_from_user(
    voter: &mut VoterRecord,
    user: &UserRecord,
    shared_fields: &[String],
) {
    for name in shared_fields {
        let value = user.field(name).cloned().unwrap_or(Value::Null);
        voter.set_field(name, value);
    }
}

/// Copy the voter's value of every shared field onto the user (not saved).
pub fn copy_to_user(
    voter: &VoterRecord,
    user: &mut UserRecord,
    shared_fields: &[String],
) {
    for name in shared_fields {
        let value = voter.field(name).cloned().unwrap_or(Value::Null);
        user.set_field(name, value);
    }
}

pub struct UserFieldSynchronizer {
    users: Arc<dyn UserDirectory>,
    // read at synchronization time, so it can be flipped without a restart
    sync_fields: AtomicBool,
    shared_fields: Vec<String>,
}

impl UserFieldSynchronizer {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        settings: &VoterSettings,
    ) -> Self {
        let shared_fields =
            compute_shared_field_names(&settings.user_schema(), &settings.voter_schema());
        tracing::debug!(?shared_fields, "computed shared fields");
        Self {
            users,
            sync_fields: AtomicBool::new(settings.sync_fields),
            shared_fields,
        }
    }

    pub fn shared_fields(&self) -> &[String] { &self.shared_fields }

    pub fn is_enabled(&self) -> bool { self.sync_fields.load(Ordering::SeqCst) }

    pub fn set_enabled(
        &self,
        enabled: bool,
    ) {
        self.sync_fields.store(enabled, Ordering::SeqCst);
    }

    /// The user account a voter corresponds to: the linked account if it
    /// still exists, otherwise the (last) account with the voter's email. An
    /// empty or malformed email means no user, not an error.
    #[tracing::instrument(name = "Resolving user of voter", skip(self, voter), fields(voter_id = ?voter.id()))]
    pub async fn get_user(
        &self,
        voter: &VoterRecord,
    ) -> Result<Option<UserRecord>, StorageError> {
        let Some(email) = voter.parsed_email() else {
            tracing::debug!("voter has no usable email");
            return Ok(None);
        };
        if let Some(id) = voter.user_id() {
            if let Some(user) = self.users.load(id).await? {
                return Ok(Some(user));
            }
        }
        match self.users.find_ids_by_email(&email).await?.last() {
            Some(&id) => self.users.load(id).await,
            None => Ok(None),
        }
    }

    /// Link the voter to the account with the same email, unless a user id
    /// was already set. With several matches, the last one wins.
    pub async fn auto_link(
        &self,
        voter: &mut VoterRecord,
    ) -> Result<(), StorageError> {
        if voter.user_id().is_some() {
            return Ok(());
        }
        let Some(email) = voter.parsed_email() else {
            return Ok(());
        };
        if let Some(&id) = self.users.find_ids_by_email(&email).await?.last() {
            tracing::info!(user_id = %id, "linking voter to existing user");
            voter.set_user_id(Some(id));
        }
        Ok(())
    }

    /// Runs once, on a new voter, before it is first persisted.
    #[tracing::instrument(name = "Preparing new voter", skip(self, voter))]
    pub async fn post_create(
        &self,
        voter: &mut VoterRecord,
    ) -> Result<(), StorageError> {
        self.auto_link(voter).await?;
        if !self.is_enabled() {
            return Ok(());
        }
        if let Some(user) = self.get_user(voter).await? {
            pull_from_user(voter, &user, &self.shared_fields);
        }
        Ok(())
    }

    /// Runs after every persist of a voter.
    #[tracing::instrument(name = "Synchronizing saved voter", skip(self, voter), fields(voter_id = ?voter.id()))]
    pub async fn post_save(
        &self,
        voter: &VoterRecord,
    ) -> Result<(), StorageError> {
        if is_syncing() {
            tracing::debug!("already pushing to a user, skipping");
            return Ok(());
        }
        if !self.is_enabled() {
            return Ok(());
        }
        match self.get_user(voter).await? {
            Some(user) => self.push_to_user(voter, user).await,
            None => Ok(()),
        }
    }

    /// Copy shared fields onto the user and save it, inside a sync scope.
    /// Save failures are returned to the caller.
    pub async fn push_to_user(
        &self,
        voter: &VoterRecord,
        mut user: UserRecord,
    ) -> Result<(), StorageError> {
        copy_to_user(voter, &mut user, &self.shared_fields);
        SYNCING
            .scope((), async { self.users.save(&user).await })
            .await
            .map_err(|e| {
                tracing::error!(error.cause_chain = ?e, user_id = %user.id, "could not push fields to user");
                e
            })
    }
}
