use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use storefront_orders::migrator::Migrator;

/// Applies or rolls back the order schema
#[derive(Debug, Parser)]
#[command(name = "migration", version)]
struct Cli {
    /// Database URL; falls back to configuration (APP__DATABASE_URL, config/*.toml)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up {
        /// Apply at most this many migrations
        #[arg(short, long)]
        num: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        /// Roll back this many migrations
        #[arg(short, long, default_value_t = 1)]
        num: u32,
    },
    /// Show which migrations are applied
    Status,
    /// Drop everything and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let database_url = match cli.database_url {
        Some(url) => url,
        None => storefront_orders::config::load_config()?.database_url,
    };
    storefront_orders::config::init_tracing("info", false);

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    match cli.command.unwrap_or(Command::Up { num: None }) {
        Command::Up { num } => {
            Migrator::up(&db, num).await?;
            info!("Migrations applied");
        }
        Command::Down { num } => {
            Migrator::down(&db, Some(num)).await?;
            info!(num, "Migrations rolled back");
        }
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Schema recreated");
        }
    }

    Ok(())
}
