//! Telegram Bot API adapter.
//!
//! A small JSON client over `reqwest` that serves as the membership oracle
//! and the notifier for the ledger, plus the long-polling update loop.

mod poller;
mod types;

pub use poller::{run_polling, PollerConfig};
pub use types::{
    inline_keyboard, parse_start_command, ApiResponse, CallbackQuery, Chat, ChatMember,
    ChatMemberUpdated, Message, Routed, SendMessage, Update, User,
};

use crate::error::{Error, Result};
use crate::event::Reply;
use async_trait::async_trait;
use referral_ledger::{Error as LedgerError, MembershipOracle, Notifier, UserId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Bot API client.
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    /// Client for the bot with `token`. `request_timeout` must exceed the
    /// long-polling timeout.
    pub fn new(token: &str, request_timeout: Duration) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, token, request_timeout)
    }

    /// Client against a self-hosted Bot API server.
    pub fn with_api_url(api_url: &str, token: &str, request_timeout: Duration) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::Config("bot token is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token.trim()),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base, method);
        let response: ApiResponse<T> = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Error::Telegram(format!(
                "{} failed ({}): {}",
                method,
                response.error_code.unwrap_or_default(),
                response.description.unwrap_or_else(|| "no description".into())
            ))),
        }
    }

    /// The bot's own account.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query", "chat_member"],
            }),
        )
        .await
    }

    /// Send a reply with its keyboard.
    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage::from_reply(chat_id, reply))
            .await?;
        Ok(())
    }

    /// Stop the loading spinner on a pressed button.
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        let _: bool = self
            .call("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))
            .await?;
        Ok(())
    }

    pub async fn get_chat_member(&self, chat: &str, user_id: i64) -> Result<ChatMember> {
        self.call(
            "getChatMember",
            &json!({ "chat_id": chat, "user_id": user_id }),
        )
        .await
    }
}

/// Request URLs embed the bot token; never let one reach an error message.
fn transport(err: reqwest::Error) -> Error {
    Error::Http(err.without_url())
}

fn numeric_id(user: &UserId) -> referral_ledger::Result<i64> {
    user.as_str()
        .parse()
        .map_err(|_| LedgerError::InvalidUserId(user.to_string()))
}

#[async_trait]
impl MembershipOracle for TelegramClient {
    async fn is_member(&self, channel: &str, user: &UserId) -> referral_ledger::Result<bool> {
        let user_id = numeric_id(user)?;
        let member = self
            .get_chat_member(channel, user_id)
            .await
            .map_err(|e| LedgerError::OracleUnavailable(e.to_string()))?;
        Ok(member.is_member())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, user: &UserId, text: &str) -> referral_ledger::Result<()> {
        let chat_id = numeric_id(user)?;
        self.send_reply(chat_id, &Reply::text(text))
            .await
            .map_err(|e| LedgerError::Notify(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_token() {
        assert!(matches!(
            TelegramClient::new("  ", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn method_urls() {
        let client = TelegramClient::with_api_url(
            "http://localhost:8081/",
            "123:abc",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base, "http://localhost:8081/bot123:abc");
    }

    #[test]
    fn only_numeric_ids_reach_the_api() {
        assert_eq!(numeric_id(&UserId::new("42")).unwrap(), 42);
        assert!(matches!(
            numeric_id(&UserId::new("u1")),
            Err(LedgerError::InvalidUserId(_))
        ));
    }

    #[tokio::test]
    async fn transport_errors_hide_the_token() {
        // Nothing listens on the discard port.
        let client = TelegramClient::with_api_url(
            "http://127.0.0.1:9",
            "123456:SECRETTOKEN",
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.get_me().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(!err.to_string().contains("SECRETTOKEN"), "{}", err);

        let err = client.is_member("@chan", &UserId::new("1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::OracleUnavailable(_)));
        assert!(!err.to_string().contains("SECRETTOKEN"), "{}", err);
    }

    #[test]
    fn api_error_envelope() {
        let response: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"}"#,
        )
        .unwrap();
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(403));
        assert!(response.result.is_none());
    }
}
