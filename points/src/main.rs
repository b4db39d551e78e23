//! `reset-points` binary
//!
//! Runs the monthly contribution-point reset for the given principals against
//! the configured `PostgreSQL` document store.

use anyhow::{Context, Result};
use clap::Parser;
use pointkeeper_core::auth::PrincipalId;
use pointkeeper_core::environment::SystemClock;
use pointkeeper_points::metrics::MetricsServer;
use pointkeeper_points::{Config, PointsResetter};
use pointkeeper_postgres::PostgresDocumentStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reset-points")]
#[command(about = "Reset contribution points for principals entering a new month")]
struct Args {
    /// Principal ids whose counters should be checked
    #[arg(required = true, num_args = 1..)]
    principals: Vec<PrincipalId>,

    /// Do not create the documents table before running
    #[arg(long, default_value = "false")]
    skip_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reset_points=info,pointkeeper_points=info,pointkeeper_postgres=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    if let Some(addr) = config.metrics_addr {
        MetricsServer::new(addr)
            .start()
            .context("Failed to start metrics server")?;
    }

    let store = PostgresDocumentStore::connect(&config.database.url, &config.database.pool)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if !args.skip_migrate {
        store.migrate().await.context("Failed to prepare documents table")?;
    }

    let resetter = PointsResetter::new(store, SystemClock).with_config(config.reset);

    let mut reset = 0usize;
    let mut failed = 0usize;
    for principal in &args.principals {
        match resetter.reset_if_new_period(Some(principal)).await {
            Ok(outcome) => {
                if outcome.performed_write() {
                    reset += 1;
                }
                tracing::info!(principal = %principal, outcome = outcome.label(), "Processed");
            },
            Err(error) => {
                failed += 1;
                tracing::warn!(
                    principal = %principal,
                    error = %error,
                    retryable = error.is_retryable(),
                    "Reset failed"
                );
            },
        }
    }

    tracing::info!(
        total = args.principals.len(),
        reset,
        failed,
        "Points reset run complete"
    );
    Ok(())
}
