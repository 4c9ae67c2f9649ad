mod fields;
mod new_voter;
mod pending_changes;
mod subscription;
mod user;
mod voter;
mod voter_email;
// allow external `use` statements to skip `voter` etc
pub use fields::compute_shared_field_names;
pub use fields::FieldDefinition;
pub use fields::FieldSchema;
pub use fields::FieldType;
pub use new_voter::NewVoter;
pub use pending_changes::ChangeAction;
pub use pending_changes::ChangeSet;
pub use pending_changes::PendingChanges;
pub use pending_changes::PendingChangesError;
pub use pending_changes::RequestedChange;
pub use subscription::NewsletterId;
pub use subscription::SubscriptionEntry;
pub use subscription::SubscriptionSource;
pub use subscription::SubscriptionStatus;
pub use subscription::Subscriptions;
pub use user::UserId;
pub use user::UserRecord;
pub use voter::StoredVoter;
pub use voter::VoterId;
pub use voter::VoterRecord;
pub use voter_email::VoterEmail;
