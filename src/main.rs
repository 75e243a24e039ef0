use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use feedward::config::Config;
use feedward::feed::{AddressGuard, FeedParser, SafeFetcher, SystemResolver};
use feedward::ingest::{is_purge_needed, prune_user, Cancellation, Ingestor};
use feedward::storage::{Database, DatabaseError};
use feedward::util::{check_url, UrlValidationError};

/// Get the config directory path (~/.config/feedward/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedward"))
}

#[derive(Parser, Debug)]
#[command(name = "feedward", version, about = "SSRF-safe RSS/Atom ingestion")]
struct Args {
    /// Config file (defaults to ~/.config/feedward/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides `database_path` from the config file)
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe a user to a feed URL
    Subscribe {
        #[arg(long)]
        user: i64,
        url: String,
    },
    /// Refresh a user's feeds and print the results as JSON
    Refresh {
        #[arg(long)]
        user: i64,
        /// Only refresh these feeds (repeatable). Defaults to all of the user's feeds.
        #[arg(long = "feed", value_name = "ID")]
        feeds: Vec<i64>,
    },
    /// Apply the retention cap to every feed of a user
    Prune {
        #[arg(long)]
        user: i64,
        /// Override `retention_cap_per_feed`
        #[arg(long)]
        cap: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `refresh` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args.config.clone().unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args
        .database
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("feedward.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The database is locked by another feedward process. Please try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match args.command {
        Command::Subscribe { user, url } => subscribe(&db, &config, user, &url).await,
        Command::Refresh { user, feeds } => refresh(db, &config, user, feeds).await,
        Command::Prune { user, cap } => prune(&db, user, cap.unwrap_or(config.retention_cap_per_feed)).await,
    }
}

async fn subscribe(db: &Database, config: &Config, user_id: i64, raw_url: &str) -> Result<()> {
    let url = url::Url::parse(raw_url.trim()).map_err(UrlValidationError::from)?;
    let guard = AddressGuard::new(Arc::new(SystemResolver), &config.allowed_private_hosts);
    let allowlisted = url.host_str().is_some_and(|host| guard.is_allowed(host));
    if !allowlisted {
        check_url(&url).with_context(|| format!("Refusing to subscribe to {raw_url}"))?;
    }

    let feed = db
        .create_feed(user_id, url.as_str())
        .await
        .context("Failed to save feed")?;
    println!("Subscribed user {} to feed {}: {}", user_id, feed.id, feed.url);
    Ok(())
}

async fn refresh(db: Database, config: &Config, user_id: i64, feeds: Vec<i64>) -> Result<()> {
    let fetcher = SafeFetcher::with_system_resolver(&config.fetcher_config())
        .context("Failed to build HTTP client")?;
    let ingestor = Ingestor::new(
        Arc::new(fetcher),
        Arc::new(FeedParser),
        Arc::new(db),
        config.ingest_settings(),
    );

    let (handle, cancel) = Cancellation::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling refresh");
            handle.cancel();
        }
    });

    let feed_ids = (!feeds.is_empty()).then_some(feeds.as_slice());
    let response = ingestor.refresh_user(user_id, feed_ids, &cancel).await;

    let json = serde_json::to_string_pretty(&response).context("Failed to serialize results")?;
    println!("{json}");
    if let Some(message) = &response.message {
        eprintln!("{message}");
    }
    Ok(())
}

async fn prune(db: &Database, user_id: i64, cap: u64) -> Result<()> {
    if !is_purge_needed(db, user_id, cap)
        .await
        .context("Failed to check retention")?
    {
        println!("Nothing to prune");
        return Ok(());
    }
    let deleted = prune_user(db, user_id, cap).await.context("Retention pass failed")?;
    println!("Deleted {deleted} items");
    Ok(())
}
