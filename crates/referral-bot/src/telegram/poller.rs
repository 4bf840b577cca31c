//! Long-polling update loop.

use super::{Routed, TelegramClient};
use crate::error::Result;
use crate::router::CommandRouter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Polling parameters.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Seconds Telegram may hold a `getUpdates` call open
    pub timeout_secs: u64,
    /// Upper bound on the wait between failed polls
    pub max_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Poll for updates until `shutdown` flips (or its sender is dropped).
///
/// Each update is handled on its own task; the ledger serializes the writes.
/// Returns only after every task it started has finished.
pub async fn run_polling(
    client: Arc<TelegramClient>,
    router: Arc<CommandRouter>,
    config: PollerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut offset: i64 = 0;
    let mut backoff = INITIAL_BACKOFF;
    let mut in_flight: JoinSet<()> = JoinSet::new();
    tracing::info!(timeout_secs = config.timeout_secs, "Polling for updates");

    loop {
        reap(&mut in_flight);

        let polled = tokio::select! {
            _ = shutdown.changed() => break,
            polled = client.get_updates(offset, config.timeout_secs) => polled,
        };

        match polled {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(join) = update.channel_join() {
                        let router = Arc::clone(&router);
                        in_flight.spawn(async move {
                            router.channel_join(&join).await;
                        });
                        continue;
                    }
                    match update.route() {
                        Some(routed) => {
                            let (client, router) = (Arc::clone(&client), Arc::clone(&router));
                            in_flight.spawn(dispatch(client, router, routed));
                        }
                        None => tracing::debug!(update_id = update.update_id, "Ignored update"),
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, retry_in = ?backoff, "getUpdates failed");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = next_backoff(backoff, config.max_backoff);
            }
        }
    }

    drain(&mut in_flight).await;
    tracing::info!("Update polling stopped");
    Ok(())
}

async fn dispatch(client: Arc<TelegramClient>, router: Arc<CommandRouter>, routed: Routed) {
    if let Some(callback_id) = &routed.callback_id {
        if let Err(e) = client.answer_callback_query(callback_id).await {
            tracing::warn!(error = %e, "Failed to answer callback query");
        }
    }

    let reply = router.handle(routed.event).await;
    if let Err(e) = client.send_reply(routed.chat_id, &reply).await {
        tracing::warn!(chat = routed.chat_id, error = %e, "Failed to send reply");
    }
}

/// Collect finished update tasks, logging any that panicked.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            tracing::error!(error = %e, "Update task failed");
        }
    }
}

/// Wait for every update task still running. Returns how many there were.
async fn drain(tasks: &mut JoinSet<()>) -> usize {
    let in_flight = tasks.len();
    if in_flight > 0 {
        tracing::info!(in_flight, "Waiting for in-flight updates");
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Update task failed");
        }
    }
    in_flight
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_max() {
        let max = Duration::from_secs(10);
        let mut b = INITIAL_BACKOFF;
        let mut seen = Vec::new();
        for _ in 0..6 {
            b = next_backoff(b, max);
            seen.push(b.as_secs());
        }
        assert_eq!(seen, vec![2, 4, 8, 10, 10, 10]);
    }

    #[tokio::test]
    async fn drain_waits_for_every_update() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let done = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        for i in 0..5u64 {
            let done = Arc::clone(&done);
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20 * i)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(drain(&mut tasks).await, 5);
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn reap_keeps_running_tasks() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {});
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        reap(&mut tasks);
        assert_eq!(tasks.len(), 1);
        tasks.abort_all();
    }
}
