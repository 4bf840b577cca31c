//! Data model for the referral ledger.
//!
//! # Core Types
//!
//! - [`UserId`] - Opaque user identifier (numeric on Telegram)
//! - [`UserRecord`] - Per-user display data and referral bookkeeping
//! - [`LedgerSnapshot`] - The full user table, loaded and saved wholesale
//!
//! # Views
//!
//! - [`Leaderboard`] - Ranked, restartable view over a snapshot

mod leaderboard;
mod snapshot;
mod user;

pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use snapshot::{LedgerSnapshot, ReferralClaim, Settlement};
pub use user::{UserId, UserRecord};
pub(crate) use user::display_label;
