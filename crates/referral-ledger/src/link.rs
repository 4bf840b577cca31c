//! Referral link derivation.
//!
//! A referral link is the bot's deep link with the referrer's id as the start
//! payload: `https://t.me/<bot>?start=<user_id>`.

use crate::error::{Error, Result};
use crate::models::UserId;

/// Builds referral links for one bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralLinks {
    base: String,
}

impl ReferralLinks {
    /// Links for the bot with the given username (leading `@` optional).
    pub fn new(bot_username: &str) -> Self {
        let bot = bot_username.trim().trim_start_matches('@');
        Self {
            base: format!("https://t.me/{}?start=", bot),
        }
    }

    /// Deep link carrying `user` as the start payload.
    pub fn derive(&self, user: &UserId) -> Result<String> {
        if !user.is_numeric() {
            return Err(Error::InvalidUserId(user.to_string()));
        }
        Ok(format!("{}{}", self.base, user))
    }

    /// The link prefix, up to and including `start=`.
    pub fn base(&self) -> &str {
        &self.base
    }
}

/// Referrer id from a `/start` payload. Anything but a plain number is ignored.
pub fn parse_start_payload(payload: &str) -> Option<UserId> {
    UserId::parse_numeric(payload).ok()
}
