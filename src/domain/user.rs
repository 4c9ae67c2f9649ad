use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Identifier of a host user account. The host uses `0` for "no user", so
/// that value never makes it into a `UserId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(raw: i64) -> Option<Self> {
        match raw {
            0 => None,
            raw => Some(Self(raw)),
        }
    }

    pub fn get(self) -> i64 { self.0 }
}

impl std::fmt::Display for UserId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The slice of a host user account that we read and write: its email (for
/// linking) and its field values (for synchronization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl UserRecord {
    pub fn new(
        id: UserId,
        email: &str,
    ) -> Self {
        Self {
            id,
            email: email.to_string(),
            fields: Map::new(),
        }
    }

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
}
