//! Referral Bot - channel-gated referral links for Telegram
//!
//! Users start the bot, join the channel, and get a personal referral link.
//! A referrer is credited once per referred user, after that user is
//! confirmed as a channel member.
//!
//! # Architecture
//!
//! - **Router**: inbound `/start` and button events to ledger calls and replies
//! - **Telegram**: Bot API client, membership oracle, notifier, polling loop
//! - **API**: read-only HTTP endpoints over the ledger
//! - **Admin Socket**: Unix socket for local admin commands (referral-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use referral_bot::{BotConfig, ReferralNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BotConfig::from_env()?;
//!     let node = ReferralNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod error;
pub mod event;
pub mod node;
pub mod render;
pub mod router;
pub mod telegram;

pub use error::{Error, Result};
pub use event::{Action, Button, ChannelJoin, InboundEvent, Reply};
pub use node::{BotConfig, ReferralNode};
pub use render::Channel;
pub use router::CommandRouter;
pub use telegram::TelegramClient;
