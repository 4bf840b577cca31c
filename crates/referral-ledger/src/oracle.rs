//! Channel membership lookup.

use crate::error::Result;
use crate::models::UserId;
use async_trait::async_trait;

/// Answers whether a user currently belongs to the gated channel.
///
/// Implementations return `Error::OracleUnavailable` on transport failure;
/// callers must then treat the user as not a member.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn is_member(&self, channel: &str, user: &UserId) -> Result<bool>;
}

/// Membership check that turns any failure into "not a member".
pub async fn is_member_fail_closed(
    oracle: &dyn MembershipOracle,
    channel: &str,
    user: &UserId,
) -> bool {
    match oracle.is_member(channel, user).await {
        Ok(member) => member,
        Err(e) => {
            tracing::warn!(
                user = %user,
                channel,
                error = %e,
                "Membership check failed, treating as non-member"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Fixed(Option<bool>);

    #[async_trait]
    impl MembershipOracle for Fixed {
        async fn is_member(&self, _channel: &str, _user: &UserId) -> Result<bool> {
            self.0
                .ok_or_else(|| Error::OracleUnavailable("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn failures_are_not_members() {
        let user = UserId::new("1");
        assert!(is_member_fail_closed(&Fixed(Some(true)), "@chan", &user).await);
        assert!(!is_member_fail_closed(&Fixed(Some(false)), "@chan", &user).await);
        assert!(!is_member_fail_closed(&Fixed(None), "@chan", &user).await);
    }
}
