// Projection audit - replays the operation log and reports drift

use anyhow::{Context, Result};
use clap::Parser;
use ledger_core::domains::operations::projection;
use ledger_core::kernel::PostgresStore;
use ledger_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ledger_audit")]
#[command(about = "Replay the operation log and compare it with stored member projections")]
struct Args {
    /// Database URL (defaults to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Do not run pending migrations first
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ledger_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let database_url = match args.database_url {
        Some(url) => url,
        None => {
            Config::from_env()
                .context("Failed to load configuration")?
                .database_url
        }
    };

    tracing::info!("Connecting to database...");
    let store = PostgresStore::connect(&database_url).await?;
    if !args.skip_migrations {
        store.migrate().await?;
    }

    let report = projection::audit_store(&store)
        .await
        .context("Audit failed")?;

    tracing::info!(
        members = report.members,
        operations = report.operations,
        "Audit complete"
    );

    let mismatches = report.mismatches;
    if mismatches.is_empty() {
        println!("OK: {} members match the operation log", report.members);
        return Ok(());
    }

    for mismatch in &mismatches {
        println!("MISMATCH member {}", mismatch.member_id);
        println!("  stored:   {:?}", mismatch.stored);
        println!("  replayed: {:?}", mismatch.replayed);
    }
    anyhow::bail!("{} member projections disagree with the log", mismatches.len())
}
