mod api;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "matchcast")]
#[command(about = "A multi-factor football match outcome prediction engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Sync teams, results, standings, injuries and baselines from upstream
    Sync,
    /// Predict a single fixture, by id or by team pair
    Predict {
        #[arg(short, long, conflicts_with_all = ["home", "away"])]
        fixture: Option<String>,
        #[arg(long, requires = "away")]
        home: Option<String>,
        #[arg(long, requires = "home")]
        away: Option<String>,
    },
    /// Predict a slate of fixtures
    Batch {
        #[arg(short, long, num_args = 1.., value_delimiter = ',')]
        fixtures: Vec<String>,
    },
    /// List upcoming fixtures
    Upcoming,
    /// Query a team's form and situation
    Team {
        #[arg(short, long)]
        name: String,
    },
    /// Initialize the database schema
    InitDb,
    /// Load the bundled EPL demo dataset
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting Matchcast API server on port {}", port);
            api::serve(port).await?;
        }
        Some(Commands::Sync) => {
            cli::sync_data().await?;
        }
        Some(Commands::Predict { fixture, home, away }) => match (fixture, home, away) {
            (Some(fixture), _, _) => cli::predict_fixture(&fixture).await?,
            (None, Some(home), Some(away)) => cli::predict_pair(&home, &away).await?,
            _ => anyhow::bail!("pass --fixture <id>, or --home <team_id> --away <team_id>"),
        },
        Some(Commands::Batch { fixtures }) => {
            cli::predict_batch(&fixtures).await?;
        }
        Some(Commands::Upcoming) => {
            cli::show_upcoming().await?;
        }
        Some(Commands::Team { name }) => {
            cli::query_team(&name).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            db::init_database().await?;
        }
        Some(Commands::Seed) => {
            cli::seed_demo_data().await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting Matchcast API server on port 3000");
            api::serve(3000).await?;
        }
    }

    Ok(())
}
