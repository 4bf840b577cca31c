//! Error types for the bot.

use thiserror::Error;

/// Result type for bot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the bot.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] referral_ledger::Error),

    /// Telegram answered with `ok: false`
    #[error("Telegram API error: {0}")]
    Telegram(String),

    /// HTTP transport error, with the request URL stripped
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
