use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

mod app;

#[derive(Parser)]
#[command(version, about = "Restaurants, pizzas and their prices over HTTP")]
struct Cli {
    #[command(flatten)]
    database: app::DatabaseArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations and serve the HTTP API
    Serve {
        #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:5555")]
        bind: SocketAddr,
    },
    /// Apply pending migrations and exit
    Migrate,
    /// Replace all rows with sample restaurants and pizzas
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { bind } => app::serve::main(&cli.database, bind).await,
        Commands::Migrate => app::migrate(&cli.database),
        Commands::Seed => app::seed::main(&cli.database),
    }
}
