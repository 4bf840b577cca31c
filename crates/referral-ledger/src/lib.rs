//! Referral Ledger - attribution and leaderboard state for a referral bot
//!
//! Issues referral links, remembers who referred whom, credits a referrer
//! once the referred user has joined the gated channel, and ranks users by
//! referral count.
//!
//! # Architecture
//!
//! - **Models**: user records, the snapshot and the leaderboard view
//! - **Store**: one JSON file, replaced atomically on every save
//! - **Ledger**: serialized load/modify/save operations over the store
//! - **Link**: referral deep links and start payload parsing
//! - **Oracle / Notify**: traits for the chat platform collaborators
//!
//! # Example
//!
//! ```no_run
//! use referral_ledger::{Ledger, Notifier, Store, UserId};
//! use std::sync::Arc;
//!
//! # async fn run(notifier: Arc<dyn Notifier>) -> referral_ledger::Result<()> {
//! let ledger = Ledger::new(Store::in_dir("./referral-data"), notifier);
//! ledger.register_user(&UserId::new("1001"), "Alice").await?;
//! let count = ledger.attribute_referral(&UserId::new("1001"), "Alice").await?;
//! assert_eq!(count, 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ledger;
pub mod link;
pub mod models;
pub mod notify;
pub mod oracle;
pub mod store;

pub use error::{Error, Result};
pub use ledger::{Ledger, LedgerStats, Profile, Registration};
pub use link::{parse_start_payload, ReferralLinks};
pub use models::{
    Leaderboard, LeaderboardEntry, LedgerSnapshot, ReferralClaim, Settlement, UserId, UserRecord,
};
pub use notify::{notify_best_effort, Notifier};
pub use oracle::{is_member_fail_closed, MembershipOracle};
pub use store::Store;
