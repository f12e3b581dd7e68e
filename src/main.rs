//! content-auth - command-line client for an OAuth-protected content site
//!
//! Logs in with the OAuth2 password grant, keeps the token fresh, and talks
//! to the site's JSON:API with it.

mod api;
mod auth;
mod config;
mod models;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::ContentClient;
use auth::TokenManager;
use config::Credentials;
use models::ArticleDraft;
use storage::{FileStore, KeyValueStore, MemoryStore};

#[derive(Parser)]
#[command(name = "content-auth")]
#[command(about = "Command-line client for an OAuth-protected content site", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the site base URL
    #[arg(long, global = true)]
    base: Option<String>,

    /// Keep the token in memory only (nothing survives the process)
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with username and password
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "CONTENT_AUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log out and delete the stored token
    Logout,

    /// Show current authentication status
    Status,

    /// Print a valid access token, refreshing it if needed
    Token,

    /// Send a request to the site, authenticated when possible
    Fetch {
        /// Path relative to the base URL, e.g. /jsonapi
        path: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra header as 'Name: value' (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Ask the site's OAuth debug endpoint who we are
    Debug,

    /// Manage articles
    Articles {
        #[command(subcommand)]
        command: ArticleCommands,
    },
}

#[derive(Subcommand)]
enum ArticleCommands {
    /// List the newest articles
    List {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Create an article
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        body: String,
    },

    /// Update an article's title and body
    Edit {
        /// Article ID (UUID, from `articles list`)
        id: String,

        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        body: String,
    },

    /// Delete an article
    Delete {
        /// Article ID (UUID, from `articles list`)
        id: String,
    },
}

fn build_manager(cli: &Cli) -> Result<TokenManager> {
    let mut creds = Credentials::load(cli.config.as_deref())?;
    if let Some(ref base) = cli.base {
        creds = creds.with_base(base.as_str())?;
    }

    let store: Arc<dyn KeyValueStore> = if cli.memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::in_data_dir()?)
    };

    Ok(TokenManager::new(creds, store))
}

/// Render epoch seconds in local time, or raw when out of range.
fn local_time(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|t| t.with_timezone(&chrono::Local).to_rfc2822())
        .unwrap_or_else(|| secs.to_string())
}

async fn status(auth: &TokenManager) -> Result<()> {
    println!("Site:        {}", auth.credentials().base);

    if !auth.is_logged_in().await {
        println!("Logged in:   no");
        println!("\nRun 'content-auth login' to authenticate.");
        return Ok(());
    }
    println!("Logged in:   yes");

    match auth.token().await.context("Failed to read stored token")? {
        Some(token) => {
            println!("Token:       valid");
            println!("  issued:     {}", local_time(token.date));
            println!("  expires_at: {}", local_time(token.expires_at));
            if let Some(ref kind) = token.token_type {
                println!("  type:       {}", kind);
            }
        }
        // Expired between the two reads and could not be refreshed
        None => println!("Token:       none"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let auth = build_manager(&cli)?;

    match cli.command {
        Commands::Login { username, password } => {
            tracing::info!("Starting login...");
            auth.login(&username, &password)
                .await
                .context("Login failed")?;
            println!("Login successful.");
        }
        Commands::Logout => {
            auth.logout().await.context("Logout failed")?;
            println!("Logged out.");
        }
        Commands::Status => {
            status(&auth).await?;
        }
        Commands::Token => match auth.token().await? {
            Some(token) => println!("{}", token.access_token),
            None => anyhow::bail!("Not logged in. Run 'content-auth login'."),
        },
        Commands::Fetch {
            path,
            method,
            headers,
            data,
        } => {
            api::fetch(&auth, &path, &method, &headers, data).await?;
        }
        Commands::Debug => {
            api::debug(&auth).await?;
        }
        Commands::Articles { command } => {
            let client = ContentClient::new(auth);
            match command {
                ArticleCommands::List { limit } => {
                    api::articles::list_articles(&client, limit).await?;
                }
                ArticleCommands::Add { title, body } => {
                    api::articles::add_article(&client, &ArticleDraft { title, body }).await?;
                }
                ArticleCommands::Edit { id, title, body } => {
                    api::articles::edit_article(&client, &id, &ArticleDraft { title, body })
                        .await?;
                }
                ArticleCommands::Delete { id } => {
                    api::articles::remove_article(&client, &id).await?;
                }
            }
        }
    }

    Ok(())
}
