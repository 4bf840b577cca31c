//! Command routing: inbound events to ledger operations and replies.
//!
//! Referral credit is deferred: a start payload only records the referrer,
//! and the referrer is credited the first time the referred user is seen as
//! a channel member: on start, on "Check Membership", or when the channel
//! reports the join itself.

use crate::event::{Action, ChannelJoin, InboundEvent, Reply};
use crate::render::{self, Channel};
use referral_ledger::{
    is_member_fail_closed, parse_start_payload, Error as LedgerError, Ledger, MembershipOracle,
    Profile, ReferralLinks, Settlement,
};
use std::sync::Arc;

/// Default number of leaderboard rows shown in chat.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;

/// Maps inbound events onto the ledger and renders the replies.
pub struct CommandRouter {
    ledger: Arc<Ledger>,
    oracle: Arc<dyn MembershipOracle>,
    links: ReferralLinks,
    channel: Channel,
    leaderboard_limit: usize,
}

impl CommandRouter {
    pub fn new(
        ledger: Arc<Ledger>,
        oracle: Arc<dyn MembershipOracle>,
        links: ReferralLinks,
        channel: Channel,
    ) -> Self {
        Self {
            ledger,
            oracle,
            links,
            channel,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
        }
    }

    pub fn with_leaderboard_limit(mut self, limit: usize) -> Self {
        self.leaderboard_limit = limit;
        self
    }

    /// Handle one event. Always produces a reply; failures become
    /// user-visible "try again" or "unavailable" messages.
    pub async fn handle(&self, event: InboundEvent) -> Reply {
        match event {
            InboundEvent::Start { user, payload } => self.start(&user, payload.as_deref()).await,
            InboundEvent::Callback { user, action } => self.callback(&user, action).await,
        }
    }

    /// Settle the referral of a user who just joined the gated channel.
    /// Joins of other chats are ignored. Nothing is sent back to the user.
    pub async fn channel_join(&self, join: &ChannelJoin) -> Option<Settlement> {
        if !self.channel.matches(join.chat_id, join.chat_username.as_deref()) {
            tracing::debug!(chat = join.chat_id, "Ignored join of another chat");
            return None;
        }
        tracing::info!(user = %join.user.id, "Joined the channel");

        match self.ledger.settle_referral(&join.user).await {
            Ok(settlement) => Some(settlement),
            Err(e) => {
                tracing::warn!(user = %join.user.id, error = %e, "Referral settlement deferred");
                None
            }
        }
    }

    async fn start(&self, user: &Profile, payload: Option<&str>) -> Reply {
        tracing::info!(user = %user.id, name = %user.display_name, payload = ?payload, "Start");

        let referrer = payload.and_then(parse_start_payload);
        if let Err(e) = self.ledger.register_profile(user, referrer.as_ref()).await {
            return failure_reply(&e);
        }

        if self.is_member(user).await {
            self.member_view(user).await
        } else {
            render::join_prompt(&self.channel, false)
        }
    }

    async fn callback(&self, user: &Profile, action: Action) -> Reply {
        tracing::info!(user = %user.id, action = action.callback_data(), "Callback");

        let member = self.is_member(user).await;
        match action {
            Action::CheckMembership if member => self.member_view(user).await,
            Action::CheckMembership => render::join_prompt(&self.channel, true),
            _ if !member => render::join_prompt(&self.channel, false),
            Action::ShowLeaderboard => self.leaderboard_view().await,
            Action::ShowReferralLink => match self.links.derive(&user.id) {
                Ok(link) => render::referral_link(&link),
                Err(e) => {
                    tracing::warn!(user = %user.id, error = %e, "Cannot derive referral link");
                    render::invalid_user()
                }
            },
        }
    }

    async fn is_member(&self, user: &Profile) -> bool {
        is_member_fail_closed(self.oracle.as_ref(), &self.channel.id, &user.id).await
    }

    async fn member_view(&self, user: &Profile) -> Reply {
        // A failed settlement stays pending and is retried on the next member view.
        if let Err(e) = self.ledger.settle_referral(user).await {
            tracing::warn!(user = %user.id, error = %e, "Referral settlement deferred");
        }

        let (count, board) = match (
            self.ledger.referral_count(&user.id).await,
            self.ledger.leaderboard().await,
        ) {
            (Ok(count), Ok(board)) => (count, board),
            (Err(e), _) | (_, Err(e)) => return failure_reply(&e),
        };

        let link = self.links.derive(&user.id).ok();
        render::welcome(user, link.as_deref(), count, board.leader())
    }

    async fn leaderboard_view(&self) -> Reply {
        match self.ledger.leaderboard().await {
            Ok(board) => render::leaderboard(&board.truncated(self.leaderboard_limit)),
            Err(e) => failure_reply(&e),
        }
    }
}

fn failure_reply(err: &LedgerError) -> Reply {
    if err.is_corrupt_store() {
        tracing::error!(error = %err, "Referral store is corrupt");
        render::leaderboard_unavailable()
    } else {
        tracing::error!(error = %err, "Ledger operation failed");
        render::try_again()
    }
}
