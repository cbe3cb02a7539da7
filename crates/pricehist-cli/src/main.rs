mod prices;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricehist-cli")]
#[command(about = "Price history and lowest-price-before-discount maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Recompute the lowest price before discount for every pricing in a channel
    Recompute {
        /// Channel code (e.g., WEB)
        #[arg(long)]
        channel: String,
    },
    /// Reapply the lowest price before discount to specific channel pricings
    Apply {
        /// Channel pricing ids
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
    /// Delete price log entries past the retention window
    Purge {
        /// Retention in days (defaults to `PRICEHIST_LOG_RETENTION_DAYS`)
        #[arg(
            long,
            value_parser = clap::value_parser!(u32)
                .range(1..=i64::from(pricehist_core::MAX_LOG_RETENTION_DAYS))
        )]
        days: Option<u32>,
        /// Rows deleted per statement (defaults to `PRICEHIST_PURGE_BATCH_SIZE`)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        batch_size: Option<i64>,
        /// Count what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the price history of a channel pricing, newest first
    History {
        /// Channel pricing id
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("pricehist-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = pricehist_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = pricehist_db::PoolConfig::from_app_config(&config);
    let pool = pricehist_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            pricehist_db::ping(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = pricehist_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Recompute { channel } => prices::run_recompute(&pool, &channel).await?,
        Commands::Apply { ids } => prices::run_apply(&pool, ids).await?,
        Commands::Purge {
            days,
            batch_size,
            dry_run,
        } => {
            let options = prices::PurgeOptions {
                retention_days: days.unwrap_or(config.log_retention_days),
                batch_size: batch_size.unwrap_or(config.purge_batch_size),
                dry_run,
            };
            prices::run_purge(&pool, &options).await?;
        }
        Commands::History { id } => prices::run_history(&pool, id).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
