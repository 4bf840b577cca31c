//! The full user table and the pure operations on it.

use super::leaderboard::Leaderboard;
use super::user::{UserId, UserRecord};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const SNAPSHOT_VERSION: u32 = 1;

/// Every user record at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Sequence number handed to the next newly registered user
    pub next_seq: u64,
    pub users: BTreeMap<UserId, UserRecord>,
}

/// Outcome of remembering a referrer for a freshly started user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralClaim {
    /// Referrer stored, waiting for the referred user to join the channel
    Recorded,
    /// The payload named the user themself
    SelfReferral,
    /// The user was registered before this start
    ExistingUser,
    /// The user already has a referrer
    AlreadyReferred,
}

/// Outcome of settling a referred user's pending referral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Referrer credited; `count` is their new total
    Credited { referrer: UserId, count: u64 },
    AlreadyCredited,
    NoReferrer,
    UnknownUser,
}

impl LedgerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, id: &UserId) -> Option<&UserRecord> {
        self.users.get(id)
    }

    /// Referral count for a user, 0 if unknown.
    pub fn referral_count(&self, id: &UserId) -> u64 {
        self.users.get(id).map(|r| r.referral_count).unwrap_or(0)
    }

    /// Sum of all referral counts.
    pub fn total_referrals(&self) -> u64 {
        self.users.values().map(|r| r.referral_count).sum()
    }

    /// Register a user. Returns true if the record was created.
    ///
    /// An existing record keeps its count; the name is refreshed, and the
    /// handle too when one is given.
    pub fn register(&mut self, id: &UserId, display_name: &str, username: Option<&str>) -> bool {
        if let Some(record) = self.users.get_mut(id) {
            record.display_name = display_name.to_string();
            if let Some(handle) = username {
                record.username = Some(handle.to_string());
            }
            return false;
        }

        let mut record = UserRecord::new(display_name, self.take_seq());
        record.username = username.map(str::to_string);
        self.users.insert(id.clone(), record);
        true
    }

    /// Add one referral to `id`, creating the record with count 1 if needed.
    /// Returns the new count.
    pub fn increment(&mut self, id: &UserId, display_name: &str) -> u64 {
        let next_seq = &mut self.next_seq;
        let record = self.users.entry(id.clone()).or_insert_with(|| {
            let record = UserRecord::new(display_name, *next_seq);
            *next_seq += 1;
            record
        });
        record.referral_count += 1;
        record.referral_count
    }

    /// Remember `referrer` for `referred`. `created` says whether `referred`
    /// was registered by the same start event.
    pub fn claim_referrer(
        &mut self,
        referred: &UserId,
        referrer: &UserId,
        created: bool,
    ) -> ReferralClaim {
        if referred == referrer {
            return ReferralClaim::SelfReferral;
        }
        if !created {
            return ReferralClaim::ExistingUser;
        }
        match self.users.get_mut(referred) {
            Some(record) if record.referred_by.is_some() => ReferralClaim::AlreadyReferred,
            Some(record) => {
                record.referred_by = Some(referrer.clone());
                ReferralClaim::Recorded
            }
            None => ReferralClaim::ExistingUser,
        }
    }

    /// Credit the remembered referrer of `referred`, at most once.
    pub fn settle(&mut self, referred: &UserId) -> Settlement {
        let referrer = match self.users.get(referred) {
            None => return Settlement::UnknownUser,
            Some(record) if record.referral_credited => return Settlement::AlreadyCredited,
            Some(record) => match &record.referred_by {
                Some(referrer) => referrer.clone(),
                None => return Settlement::NoReferrer,
            },
        };

        let fallback_name = referrer.to_string();
        let count = self.increment(&referrer, &fallback_name);
        if let Some(record) = self.users.get_mut(referred) {
            record.referral_credited = true;
        }
        Settlement::Credited { referrer, count }
    }

    /// Ranked view of every record.
    pub fn leaderboard(&self) -> Leaderboard {
        Leaderboard::from_records(self.users.iter())
    }

    /// Parse a persisted snapshot, current or legacy layout.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        match serde_json::from_slice::<SnapshotFile>(bytes)? {
            SnapshotFile::Current(file) => Ok(Self {
                next_seq: file.next_seq,
                users: file.users,
            }),
            SnapshotFile::Legacy(LegacyUsers(entries)) => {
                // Old files were written in first-registration order.
                let mut users = BTreeMap::new();
                for (id, mut record) in entries {
                    if !id.is_numeric() {
                        return Err(serde::de::Error::custom(format!(
                            "legacy snapshot has non-numeric user id {:?}",
                            id.as_str()
                        )));
                    }
                    record.registered_seq = users.len() as u64;
                    if let Some(previous) = users.insert(id.clone(), record) {
                        // Duplicate key: the later record wins, the first position stays.
                        if let Some(record) = users.get_mut(&id) {
                            record.registered_seq = previous.registered_seq;
                        }
                    }
                }
                Ok(Self {
                    next_seq: users.len() as u64,
                    users,
                })
            }
        }
    }

    /// Serialize in the current layout.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&SnapshotFileRef {
            version: SNAPSHOT_VERSION,
            next_seq: self.next_seq,
            users: &self.users,
        })
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Current(CurrentFile),
    Legacy(LegacyUsers),
}

/// The flat `{id: record}` layout, kept in document order.
struct LegacyUsers(Vec<(UserId, UserRecord)>);

impl<'de> Deserialize<'de> for LegacyUsers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = LegacyUsers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of user ids to user records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(LegacyUsers(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[derive(Deserialize)]
struct CurrentFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    next_seq: u64,
    users: BTreeMap<UserId, UserRecord>,
}

#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    version: u32,
    next_seq: u64,
    users: &'a BTreeMap<UserId, UserRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> UserId {
        UserId::new(s)
    }

    #[test]
    fn register_is_idempotent() {
        let mut snap = LedgerSnapshot::new();
        assert!(snap.register(&id("u1"), "Alice", None));
        snap.increment(&id("u1"), "Alice");
        assert!(!snap.register(&id("u1"), "Alice B", Some("alice")));
        let record = snap.get(&id("u1")).unwrap();
        assert_eq!(record.referral_count, 1);
        assert_eq!(record.display_name, "Alice B");
        assert_eq!(record.username.as_deref(), Some("alice"));
        assert_eq!(snap.next_seq, 1);
    }

    #[test]
    fn increment_creates_missing_record() {
        let mut snap = LedgerSnapshot::new();
        assert_eq!(snap.increment(&id("u_new"), "Carol"), 1);
        assert_eq!(snap.increment(&id("u_new"), "ignored"), 2);
        assert_eq!(snap.get(&id("u_new")).unwrap().display_name, "Carol");
    }

    #[test]
    fn claim_rules() {
        let mut snap = LedgerSnapshot::new();
        let created = snap.register(&id("2"), "Bob", None);
        assert_eq!(snap.claim_referrer(&id("2"), &id("2"), created), ReferralClaim::SelfReferral);
        assert_eq!(snap.claim_referrer(&id("2"), &id("1"), false), ReferralClaim::ExistingUser);
        assert_eq!(snap.claim_referrer(&id("2"), &id("1"), created), ReferralClaim::Recorded);
        assert_eq!(
            snap.claim_referrer(&id("2"), &id("3"), created),
            ReferralClaim::AlreadyReferred
        );
        assert_eq!(snap.get(&id("2")).unwrap().referred_by, Some(id("1")));
    }

    #[test]
    fn settle_credits_once() {
        let mut snap = LedgerSnapshot::new();
        snap.register(&id("1"), "Alice", None);
        let created = snap.register(&id("2"), "Bob", None);
        snap.claim_referrer(&id("2"), &id("1"), created);

        assert_eq!(
            snap.settle(&id("2")),
            Settlement::Credited { referrer: id("1"), count: 1 }
        );
        assert_eq!(snap.settle(&id("2")), Settlement::AlreadyCredited);
        assert_eq!(snap.referral_count(&id("1")), 1);
        assert_eq!(snap.settle(&id("1")), Settlement::NoReferrer);
        assert_eq!(snap.settle(&id("9")), Settlement::UnknownUser);
    }

    #[test]
    fn settle_creates_unknown_referrer() {
        let mut snap = LedgerSnapshot::new();
        let created = snap.register(&id("2"), "Bob", None);
        snap.claim_referrer(&id("2"), &id("77"), created);
        snap.settle(&id("2"));
        let referrer = snap.get(&id("77")).unwrap();
        assert_eq!(referrer.referral_count, 1);
        assert_eq!(referrer.display_name, "77");
    }

    #[test]
    fn json_roundtrip() {
        let mut snap = LedgerSnapshot::new();
        snap.register(&id("1"), "Alice", Some("alice"));
        let created = snap.register(&id("2"), "Bob", None);
        snap.claim_referrer(&id("2"), &id("1"), created);
        snap.settle(&id("2"));

        let bytes = snap.to_json().unwrap();
        let parsed = LedgerSnapshot::from_json(&bytes).unwrap();
        assert_eq!(snap, parsed);
    }

    #[test]
    fn legacy_layout_loads() {
        let legacy = br#"{
            "111": {"username": "alice", "first_name": "Alice", "referrals": 2},
            "222": {"username": null, "first_name": "Bob", "referrals": 5}
        }"#;
        let snap = LedgerSnapshot::from_json(legacy).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.next_seq, 2);
        assert_eq!(snap.referral_count(&id("222")), 5);
        assert_eq!(snap.get(&id("111")).unwrap().registered_seq, 0);
        assert_eq!(snap.get(&id("222")).unwrap().registered_seq, 1);
    }

    #[test]
    fn legacy_ties_follow_document_order() {
        let legacy = br#"{
            "9": {"first_name": "Nine", "referrals": 1},
            "10": {"first_name": "Ten", "referrals": 1},
            "8": {"first_name": "Eight", "referrals": 0}
        }"#;
        let snap = LedgerSnapshot::from_json(legacy).unwrap();
        let board = snap.leaderboard();
        let order: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, vec!["9", "10", "8"]);
        assert_eq!(snap.get(&id("10")).unwrap().registered_seq, 1);
    }

    #[test]
    fn versionless_document_is_rejected() {
        let json = br#"{"users": {"5": {"first_name": "Eve", "referrals": 1}}}"#;
        assert!(LedgerSnapshot::from_json(json).is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = br#"{"version": 1, "next_seq": 1, "future": [1, 2],
            "users": {"5": {"first_name": "Eve", "referrals": 1, "seq": 0, "badge": "gold"}}}"#;
        let snap = LedgerSnapshot::from_json(json).unwrap();
        assert_eq!(snap.referral_count(&id("5")), 1);
    }

    #[test]
    fn truncated_bytes_fail() {
        assert!(LedgerSnapshot::from_json(br#"{"version": 1, "users": {"5": {"first_"#).is_err());
        assert!(LedgerSnapshot::from_json(b"").is_err());
    }
}
