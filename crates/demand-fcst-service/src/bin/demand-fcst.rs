//! Command-line entry point.
//!
//! `demand-fcst handle [EVENT]` answers one request event read from a file
//! (or stdin) and prints the response. `demand-fcst batch --seed FILE`
//! forecasts every product of a seed file through the batch driver and
//! prints the run summary.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use demand_fcst_service::{
    handle_raw, init_tracing, BatchDriver, HandlerContext, InMemoryRepository, SeedProduct,
    ServiceConfig,
};

#[derive(Parser)]
#[command(name = "demand-fcst", about = "Demand forecasting and inventory recommendations", version)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one request event
    Handle {
        /// Event file; stdin when absent or "-"
        event: Option<PathBuf>,
    },
    /// Forecast all products of a seed file
    Batch {
        /// JSON array of products with their history
        #[arg(long)]
        seed: PathBuf,
        /// Run date (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read event file {}", p.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging.level, config.logging.json);

    match cli.command {
        Command::Handle { event } => {
            let input = read_input(event.as_ref())?;
            let ctx = HandlerContext::new(config.forecast, config.recommendations);
            let response = handle_raw(&input, &ctx);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Batch { seed, date } => {
            let raw = std::fs::read_to_string(&seed)
                .with_context(|| format!("failed to read seed file {}", seed.display()))?;
            let products: Vec<SeedProduct> =
                serde_json::from_str(&raw).context("seed file is not a product list")?;

            let repository = Arc::new(InMemoryRepository::from_seed(
                products,
                config.batch.retention_days,
            ));
            let driver = BatchDriver::new(repository, config.forecast, config.batch);
            let today = date.unwrap_or_else(|| Utc::now().date_naive());
            let summary = driver.run(today).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
