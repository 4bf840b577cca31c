//! Referral bot node: wires the ledger, the Telegram adapter and the
//! local surfaces together.
//!
//! Architecture:
//! - One ledger over a JSON snapshot in the data directory
//! - Long-polling loop feeding the command router
//! - Read-only HTTP API and a Unix admin socket (referral-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api::{self, ApiState};
use crate::error::{Error, Result};
use crate::render::Channel;
use crate::router::{CommandRouter, DEFAULT_LEADERBOARD_LIMIT};
use crate::telegram::{run_polling, PollerConfig, TelegramClient};
use referral_ledger::store::DEFAULT_IO_TIMEOUT;
use referral_ledger::{Ledger, ReferralLinks, Store};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Configuration for a bot node.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot API token
    pub token: String,

    /// Channel users must join, e.g. `@skychannel`
    pub channel: String,

    /// Join URL override for private channels
    pub channel_url: Option<String>,

    /// Bot username for referral links; looked up with `getMe` when unset
    pub bot_username: Option<String>,

    /// Data directory for the referral store
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for referral-admin CLI)
    pub admin_socket: PathBuf,

    /// Upper bound on one store load or save
    pub store_timeout: Duration,

    /// Long-polling timeout for `getUpdates`
    pub poll_timeout: Duration,

    /// Leaderboard rows shown in chat
    pub leaderboard_limit: usize,
}

impl BotConfig {
    /// Read config from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read config through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required =
            |key: &str| get(key).ok_or_else(|| Error::Config(format!("{} is not set", key)));

        let token = required("BOT_TOKEN")?;
        let channel = required("CHANNEL_ID")?;

        let data_dir = PathBuf::from(
            get("REFERRAL_DATA_DIR").unwrap_or_else(|| "./referral-data".to_string()),
        );

        let api_addr = parse_or(
            get("REFERRAL_API_ADDR"),
            "REFERRAL_API_ADDR",
            "127.0.0.1:8080".parse().ok(),
        )?;

        let admin_socket = get("REFERRAL_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("admin.sock"));

        let store_timeout_ms = parse_or(
            get("REFERRAL_STORE_TIMEOUT_MS"),
            "REFERRAL_STORE_TIMEOUT_MS",
            u64::try_from(DEFAULT_IO_TIMEOUT.as_millis()).ok(),
        )?;
        let poll_timeout_secs = parse_or(
            get("REFERRAL_POLL_TIMEOUT_SECS"),
            "REFERRAL_POLL_TIMEOUT_SECS",
            Some(PollerConfig::default().timeout_secs),
        )?;
        let leaderboard_limit = parse_or(
            get("REFERRAL_LEADERBOARD_LIMIT"),
            "REFERRAL_LEADERBOARD_LIMIT",
            Some(DEFAULT_LEADERBOARD_LIMIT),
        )?;
        if store_timeout_ms == 0 {
            return Err(Error::Config("REFERRAL_STORE_TIMEOUT_MS must be positive".into()));
        }
        if leaderboard_limit == 0 {
            return Err(Error::Config("REFERRAL_LEADERBOARD_LIMIT must be positive".into()));
        }

        Ok(Self {
            token,
            channel,
            channel_url: get("CHANNEL_URL"),
            bot_username: get("BOT_USERNAME"),
            data_dir,
            api_addr,
            admin_socket,
            store_timeout: Duration::from_millis(store_timeout_ms),
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            leaderboard_limit,
        })
    }

    fn channel(&self) -> Channel {
        let channel = Channel::new(self.channel.clone());
        match &self.channel_url {
            Some(url) => channel.with_url(url.clone()),
            None => channel,
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: Option<T>) -> Result<T> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("invalid {}: {:?}", key, v))),
        None => default.ok_or_else(|| Error::Config(format!("{} has no default", key))),
    }
}

/// A running bot instance.
pub struct ReferralNode {
    config: BotConfig,
    client: Arc<TelegramClient>,
    ledger: Arc<Ledger>,
    links: ReferralLinks,
    router: Arc<CommandRouter>,
}

impl ReferralNode {
    /// Create a bot node. Resolves the bot username and checks the store.
    pub async fn new(config: BotConfig) -> Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        // Requests must outlive the long poll
        let client = Arc::new(TelegramClient::new(
            &config.token,
            config.poll_timeout + Duration::from_secs(10),
        )?);

        let username = match &config.bot_username {
            Some(name) => name.clone(),
            None => client
                .get_me()
                .await?
                .username
                .ok_or_else(|| Error::Config("bot account has no username".into()))?,
        };
        let links = ReferralLinks::new(&username);

        let store = Store::in_dir(&config.data_dir).with_timeout(config.store_timeout);
        match store.load().await {
            Ok(snapshot) => tracing::info!(users = snapshot.len(), "Loaded referral store"),
            Err(e) if e.is_corrupt_store() => {
                // Keep serving; reads will report the store unavailable
                tracing::error!(error = %e, "Referral store is corrupt");
            }
            Err(e) => tracing::warn!(error = %e, "Referral store not readable yet"),
        }

        let ledger = Arc::new(Ledger::new(store, client.clone()));
        let router = Arc::new(
            CommandRouter::new(ledger.clone(), client.clone(), links.clone(), config.channel())
                .with_leaderboard_limit(config.leaderboard_limit),
        );

        Ok(Self {
            config,
            client,
            ledger,
            links,
            router,
        })
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    /// Run until Ctrl-C: polling, HTTP API and admin socket.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Referral bot starting");
        tracing::info!("  Bot: {}", self.links.base());
        tracing::info!("  Channel: {}", self.config.channel);
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Admin socket in background
        let admin_socket = AdminSocket::new(
            Arc::clone(&self.ledger),
            self.links.clone(),
            &self.config.admin_socket,
        );
        let admin = tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        // HTTP API
        let app = api::build_router(Arc::new(ApiState {
            ledger: Arc::clone(&self.ledger),
            links: self.links.clone(),
        }));
        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);
        let mut api_shutdown = shutdown_rx.clone();
        let api = tokio::spawn(async move {
            let stop = async move {
                let _ = api_shutdown.changed().await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stop).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });

        // Update polling
        let poller_config = PollerConfig {
            timeout_secs: self.config.poll_timeout.as_secs(),
            ..PollerConfig::default()
        };
        let poller = tokio::spawn(run_polling(
            Arc::clone(&self.client),
            Arc::clone(&self.router),
            poller_config,
            shutdown_rx,
        ));

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);

        match poller.await {
            Ok(Err(e)) => tracing::error!("Polling error: {}", e),
            Err(e) => tracing::error!("Polling task failed: {}", e),
            Ok(Ok(())) => {}
        }
        if let Err(e) = api.await {
            tracing::error!("HTTP task failed: {}", e);
        }
        admin.abort();
        let _ = std::fs::remove_file(&self.config.admin_socket);

        self.ledger.flush().await;
        tracing::info!("Referral bot stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config =
            BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "123:abc"), ("CHANNEL_ID", "@sky")]))
                .unwrap();
        assert_eq!(config.token, "123:abc");
        assert_eq!(config.channel, "@sky");
        assert_eq!(config.bot_username, None);
        assert_eq!(config.data_dir, PathBuf::from("./referral-data"));
        assert_eq!(config.admin_socket, PathBuf::from("./referral-data/admin.sock"));
        assert_eq!(config.api_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_timeout, Duration::from_secs(30));
        assert_eq!(config.leaderboard_limit, 20);
        assert_eq!(config.channel().url, "https://t.me/sky");
    }

    #[test]
    fn overrides() {
        let config = BotConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("CHANNEL_ID", "@sky"),
            ("CHANNEL_URL", "https://t.me/+invite"),
            ("BOT_USERNAME", "SkyBot"),
            ("REFERRAL_DATA_DIR", "/var/lib/referrals"),
            ("REFERRAL_API_ADDR", "0.0.0.0:9090"),
            ("REFERRAL_STORE_TIMEOUT_MS", "250"),
            ("REFERRAL_POLL_TIMEOUT_SECS", "5"),
            ("REFERRAL_LEADERBOARD_LIMIT", "10"),
        ]))
        .unwrap();
        assert_eq!(config.bot_username.as_deref(), Some("SkyBot"));
        assert_eq!(config.admin_socket, PathBuf::from("/var/lib/referrals/admin.sock"));
        assert_eq!(config.api_addr.port(), 9090);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.leaderboard_limit, 10);
        assert_eq!(config.channel().url, "https://t.me/+invite");
    }

    #[test]
    fn missing_required() {
        let err = BotConfig::from_lookup(lookup(&[("CHANNEL_ID", "@sky")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("BOT_TOKEN")));

        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("CHANNEL_ID", " ")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("CHANNEL_ID")));
    }

    #[test]
    fn malformed_values() {
        for (key, value) in [
            ("REFERRAL_API_ADDR", "nowhere"),
            ("REFERRAL_STORE_TIMEOUT_MS", "soon"),
            ("REFERRAL_STORE_TIMEOUT_MS", "0"),
            ("REFERRAL_LEADERBOARD_LIMIT", "-1"),
            ("REFERRAL_LEADERBOARD_LIMIT", "0"),
        ] {
            let result = BotConfig::from_lookup(lookup(&[
                ("BOT_TOKEN", "t"),
                ("CHANNEL_ID", "@sky"),
                (key, value),
            ]));
            assert!(matches!(result, Err(Error::Config(_))), "{}={}", key, value);
        }
    }
}
