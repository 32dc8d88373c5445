//! UserId: Opaque identifier of the user who created an annotation.
//!
//! Issued by the identity provider (or synthesized as a fallback when no
//! identity is available). Displays and serializes as the raw string.

use chrono::{DateTime, Utc};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Prefix of synthesized owner ids.
const FALLBACK_PREFIX: &str = "anonymous_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("User ID must not be empty")]
    Empty,
}

/// The identity of an annotation's owner.
///
/// Never empty: an annotation is never persisted without an owner.
///
/// # Examples
/// ```
/// use ciclomap_core::UserId;
///
/// let user: UserId = "aZ3kP9".parse().unwrap();
/// assert_eq!(user.to_string(), "aZ3kP9");
/// assert!("   ".parse::<UserId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, UserIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(UserIdError::Empty);
        }
        Ok(Self(id))
    }

    /// Synthesize a placeholder owner for a session without identity.
    ///
    /// Time-derived, so two sessions falling back at different moments never
    /// share an owner.
    pub fn fallback(now: DateTime<Utc>) -> Self {
        Self(format!("{}{}", FALLBACK_PREFIX, now.timestamp_millis()))
    }

    /// Whether this id was produced by [`UserId::fallback`].
    pub fn is_fallback(&self) -> bool {
        self.0
            .strip_prefix(FALLBACK_PREFIX)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for UserId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for UserId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rejects_blank() {
        assert_eq!(UserId::new(""), Err(UserIdError::Empty));
        assert_eq!(UserId::new(" \t"), Err(UserIdError::Empty));
    }

    #[test]
    fn test_fallback_is_time_derived() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = UserId::fallback(now);
        assert_eq!(id.as_str(), "anonymous_1700000000123");
        assert!(id.is_fallback());
    }

    #[test]
    fn test_real_ids_are_not_fallback() {
        assert!(!UserId::new("Xk2s9dLq").unwrap().is_fallback());
        assert!(!UserId::new("anonymous_").unwrap().is_fallback());
        assert!(!UserId::new("anonymous_abc").unwrap().is_fallback());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = UserId::new("user-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user-1\"");
        let parsed: UserId = serde_json::from_str("\"user-1\"").unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}
