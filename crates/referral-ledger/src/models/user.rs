//! User identity and record.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque user identifier.
///
/// Telegram hands out numeric ids; the ledger itself does not care about the
/// shape, only [`UserId::parse_numeric`] and link derivation do.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identifier without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a non-empty, all-digit identifier.
    pub fn parse_numeric(raw: &str) -> Result<Self> {
        let id = Self::new(raw.trim());
        if id.is_numeric() {
            Ok(id)
        } else {
            Err(Error::InvalidUserId(raw.to_string()))
        }
    }

    /// True if the id is non-empty and consists only of ASCII digits.
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A user's entry in the ledger.
///
/// Field names on disk (`first_name`, `username`, `referrals`) are the ones
/// the older `data_store.json` layout used, so old files still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Name shown on the leaderboard
    #[serde(rename = "first_name", default, deserialize_with = "null_as_default")]
    pub display_name: String,

    /// Platform handle, without the leading `@`
    #[serde(default)]
    pub username: Option<String>,

    /// Number of users credited to this user
    #[serde(rename = "referrals", default)]
    pub referral_count: u64,

    /// First-registration order (leaderboard tie-breaker)
    #[serde(rename = "seq", default)]
    pub registered_seq: u64,

    /// Referrer remembered from this user's first start payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<UserId>,

    /// Whether `referred_by` has been credited
    #[serde(default)]
    pub referral_credited: bool,
}

impl UserRecord {
    /// Create a record with zero referrals.
    pub fn new(display_name: impl Into<String>, registered_seq: u64) -> Self {
        Self {
            display_name: display_name.into(),
            username: None,
            referral_count: 0,
            registered_seq,
            referred_by: None,
            referral_credited: false,
        }
    }

    /// `Name (@handle)` when a handle is known, otherwise just the name.
    pub fn label(&self) -> String {
        display_label(&self.display_name, self.username.as_deref())
    }
}

pub(crate) fn display_label(name: &str, username: Option<&str>) -> String {
    match username {
        Some(handle) if !handle.is_empty() => format!("{} (@{})", name, handle),
        _ => name.to_string(),
    }
}

fn null_as_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids() {
        assert!(UserId::parse_numeric("123456").is_ok());
        assert_eq!(UserId::parse_numeric(" 42 ").unwrap().as_str(), "42");
        assert!(matches!(
            UserId::parse_numeric(""),
            Err(Error::InvalidUserId(_))
        ));
        assert!(UserId::parse_numeric("u1").is_err());
        assert!(UserId::parse_numeric("-5").is_err());
    }

    #[test]
    fn label_includes_handle() {
        let mut record = UserRecord::new("Alice", 0);
        assert_eq!(record.label(), "Alice");
        record.username = Some("alice".into());
        assert_eq!(record.label(), "Alice (@alice)");
    }

    #[test]
    fn legacy_record_with_nulls() {
        let json = r#"{"username": null, "first_name": null, "referrals": 3, "extra": true}"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.display_name, "");
        assert_eq!(record.username, None);
        assert_eq!(record.referral_count, 3);
        assert_eq!(record.referred_by, None);
        assert!(!record.referral_credited);
    }
}
