use serde::Serialize;
use validator::ValidateEmail;

/// A parsed email address. The email is the canonical identity key of a
/// voter: it is what we match against when looking for a linked user account.
///
/// Must be instantiated with `VoterEmail::parse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoterEmail(String);

impl VoterEmail {
    pub fn parse(email: String) -> Result<Self, String> {
        // trimming is the only normalisation we do; case is left alone, since
        // user lookup is an exact match
        let email = email.trim().to_string();
        ValidateEmail::validate_email(&email)
            .then_some(Self(email.clone()))
            .ok_or(format!("Invalid email: {email:?}"))
    }
}

impl AsRef<str> for VoterEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for VoterEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
