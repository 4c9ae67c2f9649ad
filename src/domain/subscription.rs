use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// Identifier of a newsletter (mailing list). Newsletters themselves live
/// outside this crate; we only ever hold their ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsletterId(pub i64);

impl std::fmt::Display for NewsletterId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Status of a single (voter, newsletter) pair. The numeric codes are what we
/// persist (`smallint`), so they must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Unsubscribed,
    #[default]
    Subscribed,
    /// The voter marker: an opt-in was requested but has not been confirmed
    /// yet.
    Pending,
}

impl SubscriptionStatus {
    pub fn code(self) -> i16 {
        match self {
            Self::Unsubscribed => 0,
            Self::Subscribed => 1,
            Self::Pending => 2,
        }
    }
}

impl TryFrom<i16> for SubscriptionStatus {
    type Error = String;
    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unsubscribed),
            1 => Ok(Self::Subscribed),
            2 => Ok(Self::Pending),
            e => Err(format!("Invalid subscription status: {e}")),
        }
    }
}

/// Free-text origin tag of a subscription change (e.g. "unknown", "import",
/// "form").
///
/// Request input must go through `SubscriptionSource::parse`; `default` is
/// "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubscriptionSource(String);

impl SubscriptionSource {
    pub fn parse(source: String) -> Result<Self, String> {
        let empty = source.trim().is_empty();
        let too_long = source.graphemes(true).count() > 64;
        let control = source.chars().any(char::is_control);
        match !empty && !too_long && !control {
            true => Ok(Self(source)),
            false => Err(format!("Invalid subscription source: {source:?}")),
        }
    }

    /// A source read back from storage. Not validated: rows written before
    /// the current rules must still load.
    pub fn from_stored(source: String) -> Self { Self(source) }
}

impl Default for SubscriptionSource {
    fn default() -> Self { Self("unknown".to_string()) }
}

impl AsRef<str> for SubscriptionSource {
    fn as_ref(&self) -> &str { &self.0 }
}

// only stored data is deserialized; request input goes through `parse`
impl<'de> Deserialize<'de> for SubscriptionSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::from_stored)
    }
}

/// A (newsletter, status, source, timestamp) tuple embedded in a voter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub newsletter_id: NewsletterId,
    pub status: SubscriptionStatus,
    pub source: SubscriptionSource,
    /// Time of the last status change
    pub timestamp: DateTime<Utc>,
}

impl SubscriptionEntry {
    pub fn is_subscribed(&self) -> bool { self.status == SubscriptionStatus::Subscribed }

    /// Whether the entry carries the voter marker (unconfirmed opt-in).
    pub fn is_voter(&self) -> bool { self.status == SubscriptionStatus::Pending }
}

/// Ordered map of subscription entries, keyed by newsletter id.
///
/// There is at most one entry per newsletter. Entries are never removed;
/// writing to an existing newsletter updates its entry in place, so iteration
/// order is always first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<SubscriptionEntry>", into = "Vec<SubscriptionEntry>")]
pub struct Subscriptions {
    entries: Vec<SubscriptionEntry>,
    // newsletter id -> position in `entries`
    index: HashMap<NewsletterId, usize>,
}

impl Subscriptions {
    pub fn get(
        &self,
        newsletter_id: NewsletterId,
    ) -> Option<&SubscriptionEntry> {
        self.index.get(&newsletter_id).map(|&i| &self.entries[i])
    }

    /// Find-or-create. An existing entry has its status, source and timestamp
    /// overwritten (last write wins); otherwise a new entry is appended.
    pub fn upsert(
        &mut self,
        newsletter_id: NewsletterId,
        status: SubscriptionStatus,
        source: SubscriptionSource,
        timestamp: DateTime<Utc>,
    ) -> &SubscriptionEntry {
        let i = match self.index.get(&newsletter_id) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.status = status;
                entry.source = source;
                entry.timestamp = timestamp;
                i
            }
            None => {
                self.entries.push(SubscriptionEntry {
                    newsletter_id,
                    status,
                    source,
                    timestamp,
                });
                let i = self.entries.len() - 1;
                self.index.insert(newsletter_id, i);
                i
            }
        };
        &self.entries[i]
    }

    /// Ids of newsletters whose current status is `Subscribed`, in
    /// first-insertion order.
    pub fn subscribed_ids(&self) -> Vec<NewsletterId> {
        self.entries
            .iter()
            .filter(|e| e.is_subscribed())
            .map(|e| e.newsletter_id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubscriptionEntry> { self.entries.iter() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

// rebuilding from storage goes through `upsert`, so a duplicated newsletter id
// collapses into one entry (the later row wins)
impl FromIterator<SubscriptionEntry> for Subscriptions {
    fn from_iter<T: IntoIterator<Item = SubscriptionEntry>>(iter: T) -> Self {
        let mut subs = Self::default();
        for e in iter {
            subs.upsert(e.newsletter_id, e.status, e.source, e.timestamp);
        }
        subs
    }
}

impl From<Vec<SubscriptionEntry>> for Subscriptions {
    fn from(value: Vec<SubscriptionEntry>) -> Self { value.into_iter().collect() }
}

impl From<Subscriptions> for Vec<SubscriptionEntry> {
    fn from(value: Subscriptions) -> Self { value.entries }
}
