use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::MailSpool;
use super::StorageError;
use super::UserDirectory;
use super::VoterStore;
use crate::domain::NewsletterId;
use crate::domain::UserId;
use crate::domain::UserRecord;
use crate::domain::VoterEmail;
use crate::domain::VoterId;
use crate::domain::VoterRecord;

#[derive(Default)]
pub struct InMemoryVoterStore {
    // voters in insertion order; ids are position + 1
    voters: Mutex<Vec<VoterRecord>>,
}

impl InMemoryVoterStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl VoterStore for InMemoryVoterStore {
    async fn load(
        &self,
        id: VoterId,
    ) -> Result<Option<VoterRecord>, StorageError> {
        let voters = self.voters.lock().await;
        Ok(voters.iter().find(|v| v.id() == Some(id)).cloned())
    }

    async fn find_by_email(
        &self,
        email: &VoterEmail,
    ) -> Result<Option<VoterRecord>, StorageError> {
        let voters = self.voters.lock().await;
        Ok(voters.iter().find(|v| v.email() == email.as_ref()).cloned())
    }

    async fn save(
        &self,
        voter: &mut VoterRecord,
    ) -> Result<(), StorageError> {
        let mut voters = self.voters.lock().await;
        match voter.id() {
            None => {
                let id = VoterId(voters.len() as i64 + 1);
                voter
                    .assign_identity(id, Uuid::new_v4(), Utc::now())
                    .map_err(StorageError::Corrupt)?;
                voters.push(voter.clone());
            }
            Some(id) => {
                let stored = voters
                    .iter_mut()
                    .find(|v| v.id() == Some(id))
                    .ok_or_else(|| StorageError::NotFound(format!("Voter {id}")))?;
                *stored = voter.clone();
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<Vec<UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self { Self::default() }

    /// Add (or replace) an account
    pub async fn insert(
        &self,
        user: UserRecord,
    ) {
        let mut users = self.users.lock().await;
        users.retain(|u| u.id != user.id);
        users.push(user);
    }

    pub async fn get(
        &self,
        id: UserId,
    ) -> Option<UserRecord> {
        self.users.lock().await.iter().find(|u| u.id == id).cloned()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_ids_by_email(
        &self,
        email: &VoterEmail,
    ) -> Result<Vec<UserId>, StorageError> {
        let users = self.users.lock().await;
        let mut ids: Vec<UserId> = users
            .iter()
            .filter(|u| u.email == email.as_ref())
            .map(|u| u.id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn load(
        &self,
        id: UserId,
    ) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.get(id).await)
    }

    async fn save(
        &self,
        user: &UserRecord,
    ) -> Result<(), StorageError> {
        let mut users = self.users.lock().await;
        let stored = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| StorageError::NotFound(format!("User {}", user.id)))?;
        *stored = user.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMailSpool {
    queue: Mutex<Vec<(VoterId, NewsletterId)>>,
}

impl InMemoryMailSpool {
    pub fn new() -> Self { Self::default() }

    pub async fn enqueue(
        &self,
        voter_id: VoterId,
        newsletter_id: NewsletterId,
    ) {
        self.queue.lock().await.push((voter_id, newsletter_id));
    }

    pub async fn queued(&self) -> Vec<(VoterId, NewsletterId)> { self.queue.lock().await.clone() }
}

#[async_trait]
impl MailSpool for InMemoryMailSpool {
    async fn delete_queued_mail(
        &self,
        voter_id: VoterId,
        newsletter_id: NewsletterId,
    ) -> Result<u64, StorageError> {
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|&(v, n)| !(v == voter_id && n == newsletter_id));
        Ok((before - queue.len()) as u64)
    }
}
