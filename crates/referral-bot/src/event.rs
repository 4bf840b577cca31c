//! Inbound events and outbound replies, independent of the chat transport.

use referral_ledger::Profile;

/// Button actions a user can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CheckMembership,
    ShowLeaderboard,
    ShowReferralLink,
}

impl Action {
    /// Callback data carried by the inline button.
    pub fn callback_data(self) -> &'static str {
        match self {
            Action::CheckMembership => "check_membership",
            Action::ShowLeaderboard => "leaderboard",
            Action::ShowReferralLink => "referral_link",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            "check_membership" => Some(Action::CheckMembership),
            "leaderboard" => Some(Action::ShowLeaderboard),
            "referral_link" => Some(Action::ShowReferralLink),
            _ => None,
        }
    }
}

/// Something a user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `/start`, optionally with a deep-link payload
    Start {
        user: Profile,
        payload: Option<String>,
    },
    /// An inline button press
    Callback { user: Profile, action: Action },
}

impl InboundEvent {
    pub fn user(&self) -> &Profile {
        match self {
            InboundEvent::Start { user, .. } | InboundEvent::Callback { user, .. } => user,
        }
    }
}

/// A user became a member of a chat the bot administers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelJoin {
    pub user: Profile,
    /// Numeric chat id
    pub chat_id: i64,
    /// Public `@username` of the chat, without the `@`
    pub chat_username: Option<String>,
}

/// An inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Callback { label: String, action: Action },
    Url { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, action: Action) -> Self {
        Button::Callback {
            label: label.into(),
            action,
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// A message to send back, with an optional inline keyboard (rows of buttons).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    /// Append a row with a single button.
    pub fn with_button(mut self, button: Button) -> Self {
        self.keyboard.push(vec![button]);
        self
    }

    /// Every callback action offered by the keyboard.
    pub fn actions(&self) -> Vec<Action> {
        self.keyboard
            .iter()
            .flatten()
            .filter_map(|b| match b {
                Button::Callback { action, .. } => Some(*action),
                Button::Url { .. } => None,
            })
            .collect()
    }
}
