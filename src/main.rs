// repocache command line.
// Wires configuration, logging, and the repository cache operations to subcommands printing JSON.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repocache::{Config, ListQuery, RepoCacheError, RepoCacheManager, Result};

#[derive(Parser)]
#[command(name = "repocache")]
#[command(about = "Cached GitHub repositories for a portfolio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cached repositories, refreshing when stale
    List {
        /// Maximum number of repositories (1-50)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Only featured repositories
        #[arg(long)]
        featured: bool,

        /// Refresh from GitHub even if the cache is fresh
        #[arg(long)]
        refresh: bool,
    },

    /// Fetch from GitHub and update the cache
    Sync,

    /// Show the state of both cache layers
    Status,

    /// Delete cached repositories
    Clear {
        /// Also drop the cached GitHub response
        #[arg(long)]
        responses: bool,
    },

    /// Show one repository
    Show {
        /// Repository name
        name: String,

        /// Ask GitHub directly instead of the cache
        #[arg(long)]
        remote: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repocache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let manager = RepoCacheManager::from_config(&config).await?;

    let result = execute(&manager, cli.command).await;
    manager.shutdown().await;
    result
}

async fn execute(manager: &RepoCacheManager, command: Commands) -> Result<()> {
    match command {
        Commands::List {
            limit,
            featured,
            refresh,
        } => {
            let repos = manager
                .list_repositories(ListQuery {
                    limit,
                    featured_only: featured,
                    force_refresh: refresh,
                })
                .await?;
            print_json(&repos)
        }

        Commands::Sync => print_json(&manager.sync_repositories().await?),

        Commands::Status => {
            let status = StatusOutput {
                durable: manager.cache_status().await?,
                responses: manager.response_cache_status().await,
            };
            print_json(&status)
        }

        Commands::Clear { responses } => {
            let report = manager.clear_cache().await?;
            if responses {
                manager.clear_response_cache().await;
            }
            print_json(&report)
        }

        Commands::Show { name, remote } => {
            if remote {
                return print_json(&manager.fetch_repository_details(&name).await?);
            }
            match manager.find_repository(&name).await? {
                Some(repo) => print_json(&repo),
                None => Err(RepoCacheError::Other(format!(
                    "Repository {} is not cached",
                    name
                ))),
            }
        }
    }
}

#[derive(Serialize)]
struct StatusOutput {
    durable: repocache::repos::CacheStatus,
    responses: repocache::repos::ResponseCacheStatus,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
