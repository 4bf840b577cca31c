//! Unix socket server for admin commands.
//!
//! Newline-delimited JSON: one [`AdminCommand`] per line in, one
//! [`AdminResponse`] per line out. Used by the `referral-admin` CLI.

use crate::error::Result;
use referral_ledger::{Ledger, ReferralLinks, UserId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Health check
    Ping,
    /// User and referral totals
    Stats,
    /// Top of the leaderboard
    Leaderboard { limit: Option<usize> },
    /// A user's referral count
    ReferralCount { user_id: String },
    /// A user's referral link
    ReferralLink { user_id: String },
    /// Register a user by hand
    Register { user_id: String, display_name: String },
}

/// Response from an admin command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Count { value: u64 },
    Stats { users: usize, referrals: u64 },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    ledger: Arc<Ledger>,
    links: ReferralLinks,
    socket_path: PathBuf,
}

impl AdminSocket {
    pub fn new(ledger: Arc<Ledger>, links: ReferralLinks, socket_path: impl AsRef<Path>) -> Self {
        Self {
            ledger,
            links,
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> Result<()> {
        // Remove a stale socket left by a previous run
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(path = %self.socket_path.display(), "Admin socket listening");

        let this = Arc::new(self);
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let this = Arc::clone(&this);
                    tokio::spawn(async move {
                        if let Err(e) = this.handle_connection(stream).await {
                            tracing::error!(error = %e, "Admin connection error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept admin connection");
                }
            }
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        while reader.read_line(&mut line).await? > 0 {
            let response = match serde_json::from_str::<AdminCommand>(&line) {
                Ok(cmd) => self.execute(cmd).await,
                Err(e) => AdminResponse::Error {
                    error: format!("Invalid command: {}", e),
                },
            };

            let response_json = serde_json::to_string(&response)? + "\n";
            writer.write_all(response_json.as_bytes()).await?;
            line.clear();
        }

        Ok(())
    }

    /// Run one command against the ledger.
    pub async fn execute(&self, cmd: AdminCommand) -> AdminResponse {
        match cmd {
            AdminCommand::Ping => AdminResponse::Pong,

            AdminCommand::Stats => match self.ledger.stats().await {
                Ok(stats) => AdminResponse::Stats {
                    users: stats.users,
                    referrals: stats.referrals,
                },
                Err(e) => error(e),
            },

            AdminCommand::Leaderboard { limit } => match self.ledger.leaderboard().await {
                Ok(board) => AdminResponse::List {
                    items: board
                        .truncated(limit.unwrap_or(10))
                        .iter()
                        .map(|e| {
                            format!(
                                "{}. {} [{}]: {}",
                                e.rank,
                                e.label(),
                                e.user_id,
                                e.referral_count
                            )
                        })
                        .collect(),
                },
                Err(e) => error(e),
            },

            AdminCommand::ReferralCount { user_id } => {
                match self.ledger.referral_count(&UserId::new(user_id)).await {
                    Ok(value) => AdminResponse::Count { value },
                    Err(e) => error(e),
                }
            }

            AdminCommand::ReferralLink { user_id } => {
                match self.links.derive(&UserId::new(user_id)) {
                    Ok(link) => AdminResponse::Ok { message: link },
                    Err(e) => error(e),
                }
            }

            AdminCommand::Register {
                user_id,
                display_name,
            } => {
                let id = match UserId::parse_numeric(&user_id) {
                    Ok(id) => id,
                    Err(e) => return error(e),
                };
                match self.ledger.register_user(&id, &display_name).await {
                    Ok(true) => {
                        tracing::info!(user = %id, "Registered user via admin socket");
                        AdminResponse::Ok {
                            message: format!("Registered {}", id),
                        }
                    }
                    Ok(false) => AdminResponse::Ok {
                        message: format!("{} already registered", id),
                    },
                    Err(e) => error(e),
                }
            }
        }
    }
}

fn error(e: referral_ledger::Error) -> AdminResponse {
    AdminResponse::Error {
        error: e.to_string(),
    }
}

/// Default socket path.
pub fn default_socket_path() -> PathBuf {
    let data_dir =
        std::env::var("REFERRAL_DATA_DIR").unwrap_or_else(|_| "./referral-data".to_string());
    PathBuf::from(data_dir).join("admin.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use referral_ledger::{Notifier, Store};
    use tempfile::{tempdir, TempDir};

    struct Silent;

    #[async_trait]
    impl Notifier for Silent {
        async fn notify(&self, _user: &UserId, _text: &str) -> referral_ledger::Result<()> {
            Ok(())
        }
    }

    fn admin() -> (TempDir, AdminSocket) {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Ledger::new(Store::in_dir(dir.path()), Arc::new(Silent)));
        let socket = AdminSocket::new(
            ledger,
            ReferralLinks::new("bot"),
            dir.path().join("admin.sock"),
        );
        (dir, socket)
    }

    #[test]
    fn command_wire_format() {
        let cmd: AdminCommand =
            serde_json::from_str(r#"{"cmd": "referral_count", "user_id": "42"}"#).unwrap();
        assert_eq!(cmd, AdminCommand::ReferralCount { user_id: "42".into() });

        let cmd: AdminCommand = serde_json::from_str(r#"{"cmd": "leaderboard"}"#).unwrap();
        assert_eq!(cmd, AdminCommand::Leaderboard { limit: None });

        let json = serde_json::to_string(&AdminResponse::Count { value: 3 }).unwrap();
        assert_eq!(json, r#"{"status":"count","value":3}"#);
    }

    #[tokio::test]
    async fn register_and_query() {
        let (_dir, admin) = admin();
        let reply = admin
            .execute(AdminCommand::Register {
                user_id: "42".into(),
                display_name: "Ada".into(),
            })
            .await;
        assert_eq!(reply, AdminResponse::Ok { message: "Registered 42".into() });

        let reply = admin
            .execute(AdminCommand::Register {
                user_id: "42".into(),
                display_name: "Ada".into(),
            })
            .await;
        assert_eq!(reply, AdminResponse::Ok { message: "42 already registered".into() });

        assert_eq!(
            admin.execute(AdminCommand::ReferralCount { user_id: "42".into() }).await,
            AdminResponse::Count { value: 0 }
        );
        assert_eq!(
            admin.execute(AdminCommand::Stats).await,
            AdminResponse::Stats { users: 1, referrals: 0 }
        );
        assert_eq!(
            admin.execute(AdminCommand::Leaderboard { limit: None }).await,
            AdminResponse::List { items: vec!["1. Ada [42]: 0".into()] }
        );
    }

    #[tokio::test]
    async fn bad_ids_are_errors() {
        let (_dir, admin) = admin();
        let reply = admin
            .execute(AdminCommand::ReferralLink { user_id: "x1".into() })
            .await;
        assert!(matches!(reply, AdminResponse::Error { .. }));
        let reply = admin
            .execute(AdminCommand::Register {
                user_id: "".into(),
                display_name: "Nobody".into(),
            })
            .await;
        assert!(matches!(reply, AdminResponse::Error { .. }));
    }

    #[tokio::test]
    async fn serves_over_the_socket() {
        let (dir, admin) = admin();
        let path = admin.socket_path().to_path_buf();
        let server = tokio::spawn(admin.run());

        // Wait for the listener to come up.
        let mut stream = None;
        for _ in 0..50 {
            if let Ok(s) = UnixStream::connect(&path).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let stream = stream.expect("admin socket did not come up");

        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"{\"cmd\":\"ping\"}\n").await.unwrap();
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        let response: AdminResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response, AdminResponse::Pong);

        server.abort();
        drop(dir);
    }
}
