use serde_json::Map;
use serde_json::Value;

use super::UserId;
use super::VoterEmail;

/// A validated request to create a voter. Custom field values are checked
/// against the voter schema when the voter is created, not here.
pub struct NewVoter {
    pub email: VoterEmail,
    pub user_id: Option<UserId>,
    pub status: bool,
    pub langcode: Option<String>,
    pub fields: Map<String, Value>,
}

impl NewVoter {
    pub fn new(email: VoterEmail) -> Self {
        Self {
            email,
            user_id: None,
            status: true,
            langcode: None,
            fields: Map::new(),
        }
    }
}
