use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::MailSpool;
use super::StorageError;
use super::UserDirectory;
use super::VoterStore;
use crate::domain::NewsletterId;
use crate::domain::StoredVoter;
use crate::domain::SubscriptionEntry;
use crate::domain::SubscriptionSource;
use crate::domain::SubscriptionStatus;
use crate::domain::Subscriptions;
use crate::domain::UserId;
use crate::domain::UserRecord;
use crate::domain::VoterEmail;
use crate::domain::VoterId;
use crate::domain::VoterRecord;

/// Create (or update) the tables in `./migrations`. Should be run once at
/// startup, before the server accepts requests.
pub async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to migrate")
}

// note: the runtime-checked `sqlx::query` is used throughout (rather than
// `query!`), so that building does not require a live db or a `.sqlx` dir

#[derive(sqlx::FromRow)]
struct VoterRow {
    id: i64,
    uuid: Uuid,
    email: String,
    user_id: Option<i64>,
    status: bool,
    langcode: Option<String>,
    changes: Option<String>,
    fields: Value,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    newsletter_id: i64,
    status: i16,
    source: String,
    changed_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionEntry {
    type Error = StorageError;
    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            newsletter_id: NewsletterId(row.newsletter_id),
            status: SubscriptionStatus::try_from(row.status).map_err(StorageError::Corrupt)?,
            source: SubscriptionSource::from_stored(row.source),
            timestamp: row.changed_at,
        })
    }
}

fn fields_object(value: Value) -> Result<serde_json::Map<String, Value>, StorageError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Corrupt(format!(
            "fields must be a json object, got {other}"
        ))),
    }
}

pub struct PgVoterStore {
    pool: PgPool,
}

impl PgVoterStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn restore(
        &self,
        row: VoterRow,
    ) -> Result<VoterRecord, StorageError> {
        let subscriptions = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT newsletter_id, status, source, changed_at
            FROM voter_subscriptions
            WHERE voter_id = $1
            ORDER BY position
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(SubscriptionEntry::try_from)
        .collect::<Result<Subscriptions, _>>()?;

        Ok(VoterRecord::restore(StoredVoter {
            id: VoterId(row.id),
            uuid: row.uuid,
            created_at: row.created_at,
            email: row.email,
            user_id: row.user_id.and_then(UserId::new),
            status: row.status,
            langcode: row.langcode,
            changes: row.changes,
            fields: fields_object(row.fields)?,
            subscriptions,
        }))
    }
}

#[async_trait]
impl VoterStore for PgVoterStore {
    #[tracing::instrument(name = "Loading voter from db", skip(self))]
    async fn load(
        &self,
        id: VoterId,
    ) -> Result<Option<VoterRecord>, StorageError> {
        let row = sqlx::query_as::<_, VoterRow>(
            r#"
            SELECT id, uuid, email, user_id, status, langcode, changes, fields, created_at
            FROM voters
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.restore(row).await?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(name = "Looking up voter by email", skip(self))]
    async fn find_by_email(
        &self,
        email: &VoterEmail,
    ) -> Result<Option<VoterRecord>, StorageError> {
        let row = sqlx::query_as::<_, VoterRow>(
            r#"
            SELECT id, uuid, email, user_id, status, langcode, changes, fields, created_at
            FROM voters
            WHERE email = $1
            "#,
        )
        .bind(email.as_ref())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.restore(row).await?)),
            None => Ok(None),
        }
    }

    /// The voter row and all of its subscription rows are written in one
    /// transaction. Subscriptions are rewritten wholesale; `position` keeps
    /// their insertion order.
    #[tracing::instrument(
        name = "Saving voter to db",
        skip(self, voter),
        fields(voter_id = ?voter.id())
    )]
    async fn save(
        &self,
        voter: &mut VoterRecord,
    ) -> Result<(), StorageError> {
        let mut transaction = self.pool.begin().await?;
        let fields = Value::Object(voter.fields().clone());

        let (id, new_identity) = match voter.id() {
            None => {
                let uuid = Uuid::new_v4();
                let created_at = Utc::now();
                let id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO voters
                        (uuid, email, user_id, status, langcode, changes, fields, created_at)
                    VALUES
                        ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING id
                    "#,
                )
                .bind(uuid)
                .bind(voter.email())
                .bind(voter.user_id().map(UserId::get))
                .bind(voter.status())
                .bind(voter.langcode())
                .bind(voter.raw_changes())
                .bind(&fields)
                .bind(created_at)
                .fetch_one(&mut *transaction)
                .await?;
                (VoterId(id), Some((uuid, created_at)))
            }
            Some(id) => {
                let updated = sqlx::query(
                    r#"
                    UPDATE voters
                    SET
                        email = $2,
                        user_id = $3,
                        status = $4,
                        langcode = $5,
                        changes = $6,
                        fields = $7
                    WHERE id = $1
                    "#,
                )
                .bind(id.0)
                .bind(voter.email())
                .bind(voter.user_id().map(UserId::get))
                .bind(voter.status())
                .bind(voter.langcode())
                .bind(voter.raw_changes())
                .bind(&fields)
                .execute(&mut *transaction)
                .await?
                .rows_affected();
                if updated == 0 {
                    return Err(StorageError::NotFound(format!("Voter {id}")));
                }
                (id, None)
            }
        };

        sqlx::query("DELETE FROM voter_subscriptions WHERE voter_id = $1")
            .bind(id.0)
            .execute(&mut *transaction)
            .await?;

        for (position, entry) in voter.subscriptions().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO voter_subscriptions
                    (voter_id, newsletter_id, status, source, changed_at, position)
                VALUES
                    ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id.0)
            .bind(entry.newsletter_id.0)
            .bind(entry.status.code())
            .bind(entry.source.as_ref())
            .bind(entry.timestamp)
            .bind(position as i32)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?; // this is the last db action!

        if let Some((uuid, created_at)) = new_identity {
            voter
                .assign_identity(id, uuid, created_at)
                .map_err(StorageError::Corrupt)?;
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    email: String,
    fields: Value,
}

/// Read/write access to the host's `users` table. Only the email and the
/// field values are touched.
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[tracing::instrument(name = "Looking up users by email", skip(self))]
    async fn find_ids_by_email(
        &self,
        email: &VoterEmail,
    ) -> Result<Vec<UserId>, StorageError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM users WHERE email = $1 ORDER BY user_id",
        )
        .bind(email.as_ref())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .filter_map(UserId::new)
        .collect();
        Ok(ids)
    }

    #[tracing::instrument(name = "Loading user from db", skip(self))]
    async fn load(
        &self,
        id: UserId,
    ) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, email, fields FROM users WHERE user_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id = UserId::new(row.user_id)
            .ok_or_else(|| StorageError::Corrupt("user with id 0".to_string()))?;
        Ok(Some(UserRecord {
            id,
            email: row.email,
            fields: fields_object(row.fields)?,
        }))
    }

    #[tracing::instrument(name = "Saving user to db", skip(self, user), fields(user_id = %user.id))]
    async fn save(
        &self,
        user: &UserRecord,
    ) -> Result<(), StorageError> {
        let updated = sqlx::query("UPDATE users SET email = $2, fields = $3 WHERE user_id = $1")
            .bind(user.id.get())
            .bind(&user.email)
            .bind(Value::Object(user.fields.clone()))
            .execute(&self.pool)
            .await?
            .rows_affected();
        match updated {
            0 => Err(StorageError::NotFound(format!("User {}", user.id))),
            _ => Ok(()),
        }
    }
}

pub struct PgMailSpool {
    pool: PgPool,
}

impl PgMailSpool {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl MailSpool for PgMailSpool {
    #[tracing::instrument(name = "Clearing spooled mail", skip(self))]
    async fn delete_queued_mail(
        &self,
        voter_id: VoterId,
        newsletter_id: NewsletterId,
    ) -> Result<u64, StorageError> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM mail_spool
            WHERE
                voter_id = $1 AND
                newsletter_id = $2
            "#,
        )
        .bind(voter_id.0)
        .bind(newsletter_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(deleted)
    }
}
