mod error;
mod logging;
mod models;
mod settings;
mod source;
mod store;
#[cfg(test)]
mod testutil;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use models::Product;
use settings::Settings;
use source::Source;
use store::Store;

#[derive(Parser)]
#[command(name = "foodix", about = "Nutrition facts scraper with full-replace database load")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "configs/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the configured source and replace the product table
    Run,
    /// Scrape only and write the products as JSON
    Scrape {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the product table with products from a JSON file
    Load {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Insert one product without touching existing rows
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0.0)]
        protein: f64,
        #[arg(long, default_value_t = 0.0)]
        fat: f64,
        #[arg(long, default_value_t = 0.0)]
        carbohydrate: f64,
        #[arg(long, default_value_t = 0)]
        kcal: i64,
    },
    /// Write the product table as JSON
    Dump {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show product table statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    logging::init(&settings.log);

    let t0 = Instant::now();
    info!(config = %cli.config.display(), source = ?settings.source.name, "starting");

    match cli.command {
        Commands::Run => {
            let source = Source::from_config(&settings.source)?;
            let products = source
                .parse()
                .await
                .with_context(|| format!("scraping {} failed", source.name()))?;
            println!("Scraped {} products from {}", products.len(), source.name());

            let store = open_store(&settings)?;
            let stats = store
                .insert_products(&products)
                .context("loading products failed; previous table contents kept")?;
            store.close()?;
            info!(statements = stats.statements, rows = stats.rows, "product table replaced");
            println!(
                "Replaced product table: {} rows in {} statements",
                stats.rows, stats.statements
            );
        }
        Commands::Scrape { output } => {
            let source = Source::from_config(&settings.source)?;
            let products = source
                .parse()
                .await
                .with_context(|| format!("scraping {} failed", source.name()))?;
            write_json(&products, output.as_deref())?;
            eprintln!("Scraped {} products from {}", products.len(), source.name());
        }
        Commands::Load { input } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let products: Vec<Product> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON product list", input.display()))?;

            let store = open_store(&settings)?;
            let stats = store
                .insert_products(&products)
                .context("loading products failed; previous table contents kept")?;
            store.close()?;
            println!(
                "Replaced product table: {} rows in {} statements",
                stats.rows, stats.statements
            );
        }
        Commands::Add {
            name,
            protein,
            fat,
            carbohydrate,
            kcal,
        } => {
            let product = Product {
                name: name.trim().to_string(),
                protein,
                fat,
                carbohydrate,
                kcal,
            };
            let store = open_store(&settings)?;
            store
                .insert_product(&product)
                .with_context(|| format!("failed to add {:?}", product.name))?;
            store.close()?;
            println!("Added {}", product.name);
        }
        Commands::Dump { output } => {
            let store = open_store(&settings)?;
            let products = store.fetch_all()?;
            store.close()?;
            write_json(&products, output.as_deref())?;
        }
        Commands::Stats => {
            let store = open_store(&settings)?;
            let count = store.count()?;
            store.close()?;
            println!("Database: {}", settings.db.path.display());
            println!("Products: {}", count);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", elapsed_label(elapsed));
    }

    Ok(())
}

fn open_store(settings: &Settings) -> anyhow::Result<Store> {
    if let Some(dir) = settings.db.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Store::open(&settings.db)
        .with_context(|| format!("failed to open database {}", settings.db.path.display()))
}

fn write_json(products: &[Product], output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(products)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Wall-clock time as `12.3s`, `4m05s` or `1h02m05s`.
fn elapsed_label(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, secs / 60 % 60, secs % 60) {
        (0, 0, _) => format!("{:.1}s", d.as_secs_f64()),
        (0, m, s) => format!("{}m{:02}s", m, s),
        (h, m, s) => format!("{}h{:02}m{:02}s", h, m, s),
    }
}
