//! Referral ledger: registration, attribution and ranking over the store.
//!
//! Every mutation is a load → modify → save cycle run under one lock, so two
//! attributions for the same referrer can never lose an increment. Reads load
//! without the lock; atomic saves guarantee they see a whole snapshot.

use crate::error::{Error, Result};
use crate::models::{
    display_label, Leaderboard, LedgerSnapshot, ReferralClaim, Settlement, UserId, UserRecord,
};
use crate::notify::{notify_best_effort, Notifier};
use crate::store::Store;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Who is acting: the fields of a platform user the ledger keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    pub username: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// `Name (@handle)` when a handle is known.
    pub fn label(&self) -> String {
        display_label(&self.display_name, self.username.as_deref())
    }
}

/// Result of registering a user from a start event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The record did not exist before
    pub created: bool,
    /// What happened to the start payload, if there was one
    pub claim: Option<ReferralClaim>,
}

/// Totals for dashboards.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LedgerStats {
    pub users: usize,
    pub referrals: u64,
}

/// The referral ledger.
pub struct Ledger {
    store: Store,
    notifier: Arc<dyn Notifier>,
    write_lock: Mutex<()>,
}

impl Ledger {
    /// Create a ledger over `store`, sending referrer notices through `notifier`.
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Register a user. Idempotent: an existing count is never touched.
    /// Returns true if the record was created.
    pub async fn register_user(&self, id: &UserId, display_name: &str) -> Result<bool> {
        let created = self
            .mutate(|snap| snap.register(id, display_name, None))
            .await?;
        if created {
            tracing::info!(user = %id, name = display_name, "Registered user");
        }
        Ok(created)
    }

    /// Register a user from a start event, remembering `referrer` if the user
    /// is new. The referrer is only credited later, by [`Ledger::settle_referral`].
    pub async fn register_profile(
        &self,
        profile: &Profile,
        referrer: Option<&UserId>,
    ) -> Result<Registration> {
        let registration = self
            .mutate(|snap| {
                let created =
                    snap.register(&profile.id, &profile.display_name, profile.username.as_deref());
                let claim = referrer.map(|r| snap.claim_referrer(&profile.id, r, created));
                Registration { created, claim }
            })
            .await?;

        if registration.created {
            tracing::info!(user = %profile.id, name = %profile.display_name, "Registered user");
        }
        match (&registration.claim, referrer) {
            (Some(ReferralClaim::Recorded), Some(referrer)) => {
                tracing::info!(user = %profile.id, referrer = %referrer, "Recorded referrer");
            }
            (Some(claim), Some(referrer)) => {
                tracing::debug!(
                    user = %profile.id,
                    referrer = %referrer,
                    ?claim,
                    "Ignored referral payload"
                );
            }
            _ => {}
        }
        Ok(registration)
    }

    /// Add one referral to `referrer_id`, creating its record with count 1 if
    /// needed, and tell the referrer. Returns the new count.
    ///
    /// Count-only: no check that the referrer exists or that the referred
    /// user was not already counted. Start events go through
    /// [`Ledger::register_profile`] and [`Ledger::settle_referral`] instead.
    pub async fn attribute_referral(
        &self,
        referrer_id: &UserId,
        referrer_display_name: &str,
    ) -> Result<u64> {
        let count = self
            .mutate(|snap| snap.increment(referrer_id, referrer_display_name))
            .await?;
        tracing::info!(referrer = %referrer_id, count, "Attributed referral");

        let notice = referral_notice(None, count);
        notify_best_effort(self.notifier.as_ref(), referrer_id, &notice).await;
        Ok(count)
    }

    /// Credit the referrer remembered for `referred`, at most once, and tell them.
    /// Call after the referred user's channel membership is confirmed.
    pub async fn settle_referral(&self, referred: &Profile) -> Result<Settlement> {
        let settlement = self.mutate(|snap| snap.settle(&referred.id)).await?;

        if let Settlement::Credited { referrer, count } = &settlement {
            tracing::info!(user = %referred.id, referrer = %referrer, count, "Settled referral");
            notify_best_effort(
                self.notifier.as_ref(),
                referrer,
                &referral_notice(Some(&referred.label()), *count),
            )
            .await;
        }
        Ok(settlement)
    }

    /// Every user ranked by referral count.
    pub async fn leaderboard(&self) -> Result<Leaderboard> {
        Ok(self.read().await?.leaderboard())
    }

    /// Referral count for a user, 0 if unknown.
    pub async fn referral_count(&self, id: &UserId) -> Result<u64> {
        Ok(self.read().await?.referral_count(id))
    }

    pub async fn user(&self, id: &UserId) -> Result<Option<UserRecord>> {
        Ok(self.read().await?.get(id).cloned())
    }

    pub async fn stats(&self) -> Result<LedgerStats> {
        let snap = self.read().await?;
        Ok(LedgerStats {
            users: snap.len(),
            referrals: snap.total_referrals(),
        })
    }

    /// Wait for any in-flight mutation. Call before exiting.
    pub async fn flush(&self) {
        let _guard = self.write_lock.lock().await;
        tracing::info!(path = %self.store.path().display(), "Ledger flushed");
    }

    async fn read(&self) -> Result<LedgerSnapshot> {
        self.store.load().await.map_err(Error::unavailable)
    }

    async fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut LedgerSnapshot) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let mut snap = self.store.load().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load ledger snapshot");
            Error::unavailable(e)
        })?;
        let out = op(&mut snap);
        self.store.save(&snap).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to save ledger snapshot");
            Error::unavailable(e)
        })?;
        Ok(out)
    }
}

fn referral_notice(referred_label: Option<&str>, count: u64) -> String {
    let plural = if count == 1 { "referral" } else { "referrals" };
    match referred_label {
        Some(label) => format!(
            "🎉 Congratulations! {} has joined the channel using your referral link. \
             You now have {} {}.",
            label, count, plural
        ),
        None => format!(
            "🎉 Congratulations! Someone joined the channel using your referral link. \
             You now have {} {}.",
            count, plural
        ),
    }
}
