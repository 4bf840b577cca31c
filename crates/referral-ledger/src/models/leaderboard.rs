//! Ranked view over the user table.

use super::user::{display_label, UserId, UserRecord};
use serde::Serialize;

/// One ranked row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    pub user_id: UserId,
    pub display_name: String,
    pub username: Option<String>,
    pub referral_count: u64,
}

impl LeaderboardEntry {
    /// `Name (@handle)` when a handle is known.
    pub fn label(&self) -> String {
        display_label(&self.display_name, self.username.as_deref())
    }
}

/// Records ordered by referral count, highest first.
///
/// Equal counts keep first-registration order. The view is finite and can be
/// iterated any number of times.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub(crate) fn from_records<'a>(
        records: impl Iterator<Item = (&'a UserId, &'a UserRecord)>,
    ) -> Self {
        let mut rows: Vec<(&UserId, &UserRecord)> = records.collect();
        rows.sort_by(|(_, a), (_, b)| {
            b.referral_count
                .cmp(&a.referral_count)
                .then(a.registered_seq.cmp(&b.registered_seq))
        });

        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(i, (id, record))| LeaderboardEntry {
                rank: i + 1,
                user_id: id.clone(),
                display_name: record.display_name.clone(),
                username: record.username.clone(),
                referral_count: record.referral_count,
            })
            .collect();

        Self { entries }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LeaderboardEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first-ranked entry, if any.
    pub fn leader(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }

    /// Position of a user, if present.
    pub fn rank_of(&self, id: &UserId) -> Option<usize> {
        self.entries.iter().find(|e| &e.user_id == id).map(|e| e.rank)
    }

    /// Keep only the first `limit` entries.
    pub fn truncated(mut self, limit: usize) -> Self {
        self.entries.truncate(limit);
        self
    }
}

impl<'a> IntoIterator for &'a Leaderboard {
    type Item = &'a LeaderboardEntry;
    type IntoIter = std::slice::Iter<'a, LeaderboardEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Leaderboard {
    type Item = LeaderboardEntry;
    type IntoIter = std::vec::IntoIter<LeaderboardEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::models::LedgerSnapshot;
    use crate::models::UserId;

    #[test]
    fn sorted_descending_with_registration_ties() {
        let mut snap = LedgerSnapshot::new();
        for (id, name) in [("c", "Carol"), ("a", "Alice"), ("b", "Bob"), ("d", "Dan")] {
            snap.register(&UserId::new(id), name, None);
        }
        snap.increment(&UserId::new("b"), "Bob");
        snap.increment(&UserId::new("b"), "Bob");
        snap.increment(&UserId::new("d"), "Dan");
        snap.increment(&UserId::new("a"), "Alice");

        let board = snap.leaderboard();
        let order: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
        // a and d tie on 1; a registered first. c has 0.
        assert_eq!(order, vec!["b", "a", "d", "c"]);

        let counts: Vec<u64> = board.iter().map(|e| e.referral_count).collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(board.rank_of(&UserId::new("d")), Some(3));
        assert_eq!(board.leader().map(|e| e.display_name.as_str()), Some("Bob"));
    }

    #[test]
    fn restartable_and_truncatable() {
        let mut snap = LedgerSnapshot::new();
        snap.register(&UserId::new("1"), "One", Some("one"));
        snap.register(&UserId::new("2"), "Two", None);

        let board = snap.leaderboard();
        assert_eq!((&board).into_iter().count(), 2);
        assert_eq!((&board).into_iter().count(), 2);
        assert_eq!(board.iter().next().unwrap().label(), "One (@one)");

        let top = board.truncated(1);
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn empty_board() {
        let board = LedgerSnapshot::new().leaderboard();
        assert!(board.is_empty());
        assert!(board.leader().is_none());
    }
}
