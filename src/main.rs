use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daylist::config::Config;
use daylist::session::SessionManager;
use daylist::store::{IdentityStore, SessionStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "daylist", version, about = "Personal list manager with local and Google sign-in")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP gateway
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the bind port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Delete expired sessions and exit
    PurgeSessions {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Sign a user out everywhere by deleting all of their sessions
    RevokeSessions {
        /// Account email, exactly as registered
        email: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List registered accounts
    Users {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daylist=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => {
            let mut config = load_config(config)?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            daylist::gateway::run_gateway(config).await
        }
        Command::PurgeSessions { config } => {
            let config = load_config(config)?;
            let store = SqliteStore::open(&config.storage.database_path)?;
            let removed = store.delete_expired_sessions(chrono::Utc::now().timestamp())?;
            println!("Removed {removed} expired session(s)");
            Ok(())
        }
        Command::RevokeSessions { email, config } => {
            let config = load_config(config)?;
            let store = Arc::new(SqliteStore::open(&config.storage.database_path)?);
            let user = store
                .find_user_by_email(email.trim())?
                .with_context(|| format!("no account registered for {email}"))?;
            let sessions = SessionManager::new(store.clone(), store, &config.session)?;
            let removed = sessions.terminate_all(user.id)?;
            tracing::info!(user_id = user.id, removed, "Revoked sessions");
            println!("Revoked {removed} session(s) for {}", user.email);
            Ok(())
        }
        Command::Users { config } => {
            let config = load_config(config)?;
            let store = SqliteStore::open(&config.storage.database_path)?;
            let users = store.list_users()?;
            if users.is_empty() {
                println!("No users registered.");
            }
            for user in users {
                let kind = if user.is_federated_only() { "google" } else { "local" };
                let created = chrono::DateTime::from_timestamp(user.created_at, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{:>6}  {:<6}  {}  {}", user.id, kind, created, user.email);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    Config::load(path.as_deref()).context("failed to load configuration")
}
