//! Outbound notifications to users.

use crate::error::Result;
use crate::models::UserId;
use async_trait::async_trait;

/// Delivers a text message to a user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: &UserId, text: &str) -> Result<()>;
}

/// Send a notification, logging instead of returning failures.
pub async fn notify_best_effort(notifier: &dyn Notifier, user: &UserId, text: &str) -> bool {
    match notifier.notify(user, text).await {
        Ok(()) => {
            tracing::info!(user = %user, "Notified user");
            true
        }
        Err(e) => {
            tracing::warn!(user = %user, error = %e, "Notification failed");
            false
        }
    }
}
