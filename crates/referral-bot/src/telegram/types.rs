//! The subset of Bot API objects the bot reads and writes.

use crate::event::{Action, Button, ChannelJoin, InboundEvent, Reply};
use referral_ledger::{Profile, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            id: UserId::from(self.id),
            display_name: self.first_name.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
    /// Membership change in a chat the bot administers
    pub chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub old_chat_member: ChatMember,
    pub new_chat_member: ChatMember,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub user: Option<User>,
    pub status: String,
    /// Only present for `restricted` members
    pub is_member: Option<bool>,
}

impl ChatMember {
    /// Whether this status counts as being in the channel.
    pub fn is_member(&self) -> bool {
        match self.status.as_str() {
            "member" | "administrator" | "creator" => true,
            "restricted" => self.is_member.unwrap_or(false),
            _ => false,
        }
    }
}

/// An update turned into something the router understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    /// Chat to answer in
    pub chat_id: i64,
    /// Callback query to acknowledge, if the update was a button press
    pub callback_id: Option<String>,
    pub event: InboundEvent,
}

impl Update {
    /// Convert to a router event. Anything but `/start` and known buttons is `None`.
    pub fn route(&self) -> Option<Routed> {
        if let Some(message) = &self.message {
            let from = message.from.as_ref().filter(|u| !u.is_bot)?;
            let payload = parse_start_command(message.text.as_deref()?)?;
            return Some(Routed {
                chat_id: message.chat.id,
                callback_id: None,
                event: InboundEvent::Start {
                    user: from.profile(),
                    payload,
                },
            });
        }

        if let Some(query) = &self.callback_query {
            let action = Action::from_callback_data(query.data.as_deref()?)?;
            let chat_id = query
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(query.from.id);
            return Some(Routed {
                chat_id,
                callback_id: Some(query.id.clone()),
                event: InboundEvent::Callback {
                    user: query.from.profile(),
                    action,
                },
            });
        }

        None
    }

    /// A user who was not a member a moment ago and now is.
    pub fn channel_join(&self) -> Option<ChannelJoin> {
        let change = self.chat_member.as_ref()?;
        if change.old_chat_member.is_member() || !change.new_chat_member.is_member() {
            return None;
        }
        let user = change.new_chat_member.user.as_ref().filter(|u| !u.is_bot)?;
        Some(ChannelJoin {
            user: user.profile(),
            chat_id: change.chat.id,
            chat_username: change.chat.username.clone(),
        })
    }
}

/// Parse `/start`, `/start payload` or `/start@BotName payload`.
/// Returns `None` for other text, `Some(None)` for a bare `/start`.
pub fn parse_start_command(text: &str) -> Option<Option<String>> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;
    let name = command.split('@').next()?;
    if name != "/start" {
        return None;
    }
    Some(parts.next().map(str::to_string))
}

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<Value>,
    pub disable_web_page_preview: bool,
}

impl<'a> SendMessage<'a> {
    pub fn from_reply(chat_id: i64, reply: &'a Reply) -> Self {
        Self {
            chat_id,
            text: &reply.text,
            reply_markup: inline_keyboard(&reply.keyboard),
            disable_web_page_preview: true,
        }
    }
}

/// `InlineKeyboardMarkup` for a keyboard, `None` when there are no buttons.
pub fn inline_keyboard(rows: &[Vec<Button>]) -> Option<Value> {
    if rows.is_empty() {
        return None;
    }
    let rows: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match button {
                    Button::Callback { label, action } => {
                        json!({ "text": label, "callback_data": action.callback_data() })
                    }
                    Button::Url { label, url } => json!({ "text": label, "url": url }),
                })
                .collect()
        })
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}
