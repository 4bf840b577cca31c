//! Message texts and keyboards.

use crate::event::{Action, Button, Reply};
use referral_ledger::{Leaderboard, LeaderboardEntry, Profile};

/// The gated channel as shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Chat id or `@username` used for membership lookups
    pub id: String,
    /// Link behind the "Join Channel" button
    pub url: String,
}

impl Channel {
    /// Channel with the public `t.me` link derived from an `@username` id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("https://t.me/{}", id.trim_start_matches('@'));
        Self { id, url }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Whether a chat seen in an update is this channel.
    pub fn matches(&self, chat_id: i64, chat_username: Option<&str>) -> bool {
        if self.id == chat_id.to_string() {
            return true;
        }
        match (self.id.strip_prefix('@'), chat_username) {
            (Some(name), Some(username)) => name.eq_ignore_ascii_case(username),
            _ => false,
        }
    }

    /// `@channel` for message texts.
    pub fn handle(&self) -> String {
        format!("@{}", self.id.trim_start_matches('@'))
    }
}

/// Greeting for a confirmed member.
pub fn welcome(
    user: &Profile,
    link: Option<&str>,
    referral_count: u64,
    leader: Option<&LeaderboardEntry>,
) -> Reply {
    let mut text = format!(
        "👋 Welcome {}!\nYou are a member of the channel. \
         Refer others and become a winner of the challenge!\n\n",
        user.display_name
    );
    if let Some(link) = link {
        text.push_str(&format!("🔗 Your referral link: {}\n\n", link));
    }
    text.push_str(&format!("🏅 You have invited {} so far.\n", people(referral_count)));
    match leader {
        Some(leader) if leader.referral_count > 0 => text.push_str(&format!(
            "👑 Current leader: {} with {}.\n",
            leader.label(),
            referrals(leader.referral_count)
        )),
        _ => text.push_str("👑 Current leader: No one yet.\n"),
    }

    member_keyboard(Reply::text(text))
}

/// Ask a non-member to join. `retry` is used after a failed membership check.
pub fn join_prompt(channel: &Channel, retry: bool) -> Reply {
    let text = if retry {
        format!("❗ You are not a member yet. Please join {}.", channel.handle())
    } else {
        format!("✅ Please join {} first to use the bot.", channel.handle())
    };
    Reply::text(text)
        .with_button(Button::url("Join Channel", channel.url.clone()))
        .with_button(Button::callback("Check Membership", Action::CheckMembership))
}

/// Ranked list, one line per user.
pub fn leaderboard(board: &Leaderboard) -> Reply {
    let mut text = String::from("🏆 Leaderboard:\n");
    if board.is_empty() {
        text.push_str("No referrals yet. Be the first!");
    }
    for entry in board {
        text.push_str(&format!(
            "{}. {}: {}\n",
            entry.rank,
            entry.label(),
            referrals(entry.referral_count)
        ));
    }
    member_keyboard(Reply::text(text.trim_end().to_string()))
}

pub fn referral_link(link: &str) -> Reply {
    Reply::text(format!(
        "🎉 Share this link and win the challenge!\n\n🔗 Join through this link 👉 {}",
        link
    ))
}

pub fn invalid_user() -> Reply {
    Reply::text("⚠️ We could not create a referral link for your account.")
}

/// The action was not recorded; the user should retry.
pub fn try_again() -> Reply {
    Reply::text(
        "⚠️ Something went wrong on our side and your action was not saved. \
         Please try again in a moment.",
    )
}

/// Degraded view when the referral data cannot be read.
pub fn leaderboard_unavailable() -> Reply {
    Reply::text("⚠️ The leaderboard is unavailable right now. Please try again later.")
}

fn member_keyboard(reply: Reply) -> Reply {
    reply
        .with_button(Button::callback("📈 Leaderboard", Action::ShowLeaderboard))
        .with_button(Button::callback("🔗 Get Referral Link", Action::ShowReferralLink))
}

fn referrals(count: u64) -> String {
    if count == 1 {
        "1 referral".to_string()
    } else {
        format!("{} referrals", count)
    }
}

fn people(count: u64) -> String {
    if count == 1 {
        "1 person".to_string()
    } else {
        format!("{} people", count)
    }
}
