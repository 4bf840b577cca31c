//! referral-admin CLI tool
//!
//! Talks to a running referral-bot over its admin socket.
//!
//! Usage:
//!   referral-admin ping
//!   referral-admin stats
//!   referral-admin leaderboard [--limit N]
//!   referral-admin count <user_id>
//!   referral-admin link <user_id>
//!   referral-admin register <user_id> <display_name>

use clap::{Parser, Subcommand};
use referral_bot::admin_socket::{default_socket_path, AdminCommand, AdminResponse};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "referral-admin")]
#[command(about = "Inspect and manage a running referral bot", long_about = None)]
struct Cli {
    /// Path to the admin socket
    #[arg(long, env = "REFERRAL_ADMIN_SOCKET")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the bot is running
    Ping,
    /// Show user and referral totals
    Stats,
    /// Show the top of the leaderboard
    Leaderboard {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show a user's referral count
    Count { user_id: String },
    /// Show a user's referral link
    Link { user_id: String },
    /// Register a user by hand
    Register {
        user_id: String,
        display_name: String,
    },
}

impl From<Command> for AdminCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::Ping => AdminCommand::Ping,
            Command::Stats => AdminCommand::Stats,
            Command::Leaderboard { limit } => AdminCommand::Leaderboard { limit },
            Command::Count { user_id } => AdminCommand::ReferralCount { user_id },
            Command::Link { user_id } => AdminCommand::ReferralLink { user_id },
            Command::Register {
                user_id,
                display_name,
            } => AdminCommand::Register {
                user_id,
                display_name,
            },
        }
    }
}

fn send_command(socket_path: &Path, cmd: &AdminCommand) -> Result<AdminResponse, String> {
    let mut stream = UnixStream::connect(socket_path).map_err(|e| {
        format!(
            "Failed to connect to referral-bot at {:?}: {}\n\
             Is the referral-bot running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn main() {
    let cli = Cli::parse();
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);

    match send_command(&socket_path, &cli.command.into()) {
        Ok(AdminResponse::Ok { message }) => println!("{}", message),
        Ok(AdminResponse::Pong) => println!("pong - referral-bot is running"),
        Ok(AdminResponse::Count { value }) => println!("{}", value),
        Ok(AdminResponse::Stats { users, referrals }) => {
            println!("users: {}", users);
            println!("referrals: {}", referrals);
        }
        Ok(AdminResponse::List { items }) => {
            if items.is_empty() {
                println!("(none)");
            } else {
                for item in items {
                    println!("{}", item);
                }
            }
        }
        Ok(AdminResponse::Error { error }) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
