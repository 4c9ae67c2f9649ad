//! Collaborators owned by the host: where voters are persisted, where user
//! accounts live, and the outbound mail spool. Each has an in-memory
//! implementation (tests, database-free runs) and a Postgres one.

mod memory;
mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;
pub use memory::InMemoryMailSpool;
pub use memory::InMemoryUserDirectory;
pub use memory::InMemoryVoterStore;
pub use postgres::run_migrations;
pub use postgres::PgMailSpool;
pub use postgres::PgUserDirectory;
pub use postgres::PgVoterStore;

use crate::domain::NewsletterId;
use crate::domain::UserId;
use crate::domain::UserRecord;
use crate::domain::VoterEmail;
use crate::domain::VoterId;
use crate::domain::VoterRecord;
use crate::utils::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Debug for StorageError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(value: sqlx::Error) -> Self { Self::Unexpected(value.into()) }
}

#[async_trait]
pub trait VoterStore: Send + Sync {
    async fn load(
        &self,
        id: VoterId,
    ) -> Result<Option<VoterRecord>, StorageError>;

    async fn find_by_email(
        &self,
        email: &VoterEmail,
    ) -> Result<Option<VoterRecord>, StorageError>;

    /// Insert a new voter (assigning id, uuid and creation time) or update an
    /// existing one, subscriptions included.
    async fn save(
        &self,
        voter: &mut VoterRecord,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Ids of all accounts with exactly this email, oldest first
    async fn find_ids_by_email(
        &self,
        email: &VoterEmail,
    ) -> Result<Vec<UserId>, StorageError>;

    async fn load(
        &self,
        id: UserId,
    ) -> Result<Option<UserRecord>, StorageError>;

    async fn save(
        &self,
        user: &UserRecord,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait MailSpool: Send + Sync {
    /// Drop queued outbound mail for this voter and newsletter. Returns the
    /// number of removed messages.
    async fn delete_queued_mail(
        &self,
        voter_id: VoterId,
        newsletter_id: NewsletterId,
    ) -> Result<u64, StorageError>;
}
