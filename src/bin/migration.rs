use clap::{Parser, Subcommand};
use drugstore_api::{config, migrator};
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back drugstore database migrations")]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations (default)
    Up,
    /// Roll back the last N migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let database_url = match cli.database_url {
        Some(url) => url,
        None => config::load_config()?.database_url,
    };

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => {
            let applied = migrator::run_migration(&database_url).await?;
            info!(applied, "Migrations applied");
        }
        Command::Down { steps } => {
            migrator::rollback_migration(&database_url, steps).await?;
            info!(steps, "Migrations rolled back");
        }
    }

    Ok(())
}
