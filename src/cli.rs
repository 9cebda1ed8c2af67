//! Operator command line.
//!
//! ```bash
//! # Run the HTTP API (default)
//! platform-auth serve
//!
//! # Create the schema and pull users in from the legacy credential file
//! platform-auth setup --legacy-file DATA/users.txt
//!
//! # Add an account by hand
//! platform-auth register -u alice -p 'SecurePass123!' -r analyst
//!
//! # Show accounts
//! platform-auth list
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app;
use crate::db;
use crate::legacy::{self, LegacyFileStore, MigrationReport};
use crate::state::AppState;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "platform-auth",
    version,
    about = "Credential service for the intelligence platform dashboard"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Apply the schema and run the HTTP API.
    Serve,

    /// Apply the schema and migrate the legacy credential file.
    Setup {
        /// Legacy `username, hash` file (defaults to LEGACY_USERS_FILE).
        #[arg(short, long)]
        legacy_file: Option<PathBuf>,
    },

    /// Register a user directly against the database.
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        /// Role to store (defaults to "user").
        #[arg(short, long)]
        role: Option<String>,
    },

    /// List registered users.
    List,
}

pub async fn run(cli: Cli, state: AppState) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            db::run_migrations(&state.db).await?;
            let addr = state.config.bind_addr()?;
            app::serve(app::build_app(state), addr).await
        }
        Commands::Setup { legacy_file } => {
            let path = legacy_file.unwrap_or_else(|| state.config.legacy_users_file.clone());
            setup(&state, path).await.map(|_| ())
        }
        Commands::Register {
            username,
            password,
            role,
        } => {
            db::run_migrations(&state.db).await?;
            let user = state
                .auth
                .register(username.trim(), &password, role.as_deref())
                .await
                .map_err(|e| anyhow::anyhow!(e.public_message()))?;
            println!("registered {} (id {}, role {})", user.username, user.id, user.role);
            Ok(())
        }
        Commands::List => {
            db::run_migrations(&state.db).await?;
            let users = state.users().list().await?;
            println!("{:<6} {:<22} {}", "ID", "USERNAME", "ROLE");
            for user in users {
                println!("{:<6} {:<22} {}", user.id, user.username, user.role);
            }
            Ok(())
        }
    }
}

async fn setup(state: &AppState, legacy_file: PathBuf) -> anyhow::Result<MigrationReport> {
    db::run_migrations(&state.db).await?;
    tracing::info!("schema ready");

    let legacy = LegacyFileStore::new(&legacy_file);
    if !legacy_file.exists() {
        tracing::warn!(path = %legacy_file.display(), "legacy credential file not found; nothing to migrate");
    }

    let report = legacy::migrate(&legacy, state.users()).await?;
    let total = state.users().count().await?;

    println!("Migrated from {}", legacy_file.display());
    println!("  {:<18} {}", "migrated", report.migrated);
    println!("  {:<18} {}", "already present", report.already_present);
    println!("  {:<18} {}", "malformed lines", report.malformed);
    println!("  {:<18} {}", "failed", report.failed);
    println!("  {:<18} {}", "users in table", total);
    Ok(report)
}
