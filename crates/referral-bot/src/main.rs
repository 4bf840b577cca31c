//! Referral bot binary
//!
//! Channel-gated referral links and a leaderboard for a Telegram channel.

use referral_bot::{BotConfig, ReferralNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "referral_bot=info,referral_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting referral bot");

    let config = BotConfig::from_env()?;

    let node = ReferralNode::new(config).await?;
    node.run().await?;

    Ok(())
}
