use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};

use bootcamp_directory::app::build_geocoder;
use bootcamp_directory::config::AppConfig;
use bootcamp_directory::db::hooks::Repositories;
use bootcamp_directory::db::indexes::ensure_indexes;
use bootcamp_directory::seeder;

#[derive(Parser)]
#[command(author, version, about = "Load or remove bootcamp directory fixture data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import users, bootcamps, courses and reviews from JSON files
    Import {
        /// Directory holding users.json, bootcamps.json, courses.json and reviews.json
        #[arg(long, default_value = "_data")]
        dir: PathBuf,
    },
    /// Delete every document from every collection
    Destroy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bootcamp_directory=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri).await?;
    let mongo_db = mongo_client.database(&config.mongodb_database);
    let repos = Repositories::mongo(&mongo_db);

    match cli.command {
        Commands::Import { dir } => {
            ensure_indexes(&mongo_db).await?;
            let geocoder = build_geocoder(&config)?;
            let summary = seeder::import(&repos, geocoder.as_ref(), &dir, Utc::now()).await?;
            println!(
                "Data imported: {} users, {} bootcamps, {} courses, {} reviews",
                summary.users, summary.bootcamps, summary.courses, summary.reviews
            );
        }
        Commands::Destroy => {
            let summary = seeder::destroy(&repos).await?;
            println!(
                "Data destroyed: {} users, {} bootcamps, {} courses, {} reviews",
                summary.users, summary.bootcamps, summary.courses, summary.reviews
            );
        }
    }
    Ok(())
}
