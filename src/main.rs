use anyhow::{Context, Result};
use catalog_sync::database_ops::db::Db;
use catalog_sync::database_ops::memory_store::MemoryCatalogStore;
use catalog_sync::database_ops::pg_store::{PgCatalogReader, PgCatalogStore};
use catalog_sync::database_ops::sampler::{parse_count, RandomSampler};
use catalog_sync::util::env as env_util;
use catalog_sync::{CatalogImporter, ImportOptions, ImportSummary};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

const DEFAULT_FEED: &str = "sample-data/products.csv";

#[derive(Parser, Debug)]
#[command(name = "catalog", version, about = "Product catalog admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Import a semicolon-delimited product feed
    Import {
        /// Feed file (defaults to sample-data/products.csv)
        file: Option<PathBuf>,
        /// Rows committed per batch (overrides IMPORT_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Category for rows without one (overrides IMPORT_DEFAULT_CATEGORY)
        #[arg(long)]
        default_category: Option<String>,
        /// Run against an in-memory catalog; the database is not touched
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Print a random sample of products
    Sample {
        /// Requested sample size, clamped to 1..=12; non-numeric means 4
        #[arg(long)]
        count: Option<String>,
        /// Print the sample as JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_util::bootstrap_cli("catalog");
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Import {
            file,
            batch_size,
            default_category,
            dry_run,
            db_url,
        } => {
            let mut options = ImportOptions::from_env();
            if let Some(size) = batch_size {
                options = options.with_batch_size(size);
            }
            if let Some(name) = default_category {
                options.default_category = name;
            }
            let path = file.unwrap_or_else(|| PathBuf::from(DEFAULT_FEED));
            let summary = import(&path, options, dry_run, db_url.as_deref()).await?;
            println!("{summary}");
        }
        Commands::Sample {
            count,
            json,
            db_url,
        } => {
            let db = connect(db_url.as_deref()).await?;
            let reader = PgCatalogReader::connect(db).await?;
            let count = parse_count(count.as_deref());
            let products = RandomSampler::new(reader).sample(Some(count)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&products)?);
                return Ok(());
            }
            if products.is_empty() {
                println!("catalog is empty");
            }
            for p in products {
                println!(
                    "{:>8}  {:<20}  {:>10}  {}",
                    p.id.unwrap_or_default(),
                    p.identifier,
                    format_cents(p.price_cents),
                    p.name
                );
            }
        }
    }
    Ok(())
}

async fn import(
    path: &Path,
    options: ImportOptions,
    dry_run: bool,
    db_url: Option<&str>,
) -> Result<ImportSummary> {
    let importer = CatalogImporter::new(options);
    if dry_run {
        info!(path = %path.display(), "dry run against in-memory catalog");
        let mut store = MemoryCatalogStore::new();
        return Ok(importer.import_path(&mut store, path).await?);
    }

    env_util::preflight_check(
        "catalog import",
        &[],
        &["DATABASE_URL", "DB_URL", "DB_HOST", "DB_MAX_CONNS", "IMPORT_BATCH_SIZE"],
    )?;
    let db = connect(db_url).await?;
    let mut store = PgCatalogStore::new(db);
    Ok(importer.import_path(&mut store, path).await?)
}

async fn connect(db_url: Option<&str>) -> Result<Db> {
    match db_url {
        Some(url) => {
            let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 5u32);
            Db::connect(url, max_connections)
                .await
                .context("connect with --db-url")
        }
        None => Db::from_env().await,
    }
}

fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_count(args: &[&str]) -> i64 {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Sample { count, .. } => parse_count(count.as_deref()),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sample_count_is_lenient() {
        assert_eq!(sample_count(&["catalog", "sample", "--count", "abc"]), 4);
        assert_eq!(sample_count(&["catalog", "sample"]), 4);
        assert_eq!(sample_count(&["catalog", "sample", "--count", "99"]), 12);
        assert_eq!(sample_count(&["catalog", "sample", "--count=-2"]), 1);
    }

    #[test]
    fn import_defaults_to_no_file() {
        let cli = Cli::try_parse_from(["catalog", "import", "--dry-run"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Import {
                file: None,
                dry_run: true,
                ..
            }
        ));
    }

    #[test]
    fn formats_cents() {
        assert_eq!(format_cents(1999), "19.99");
        assert_eq!(format_cents(5), "0.05");
    }
}
