use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_sync::catalog::{RequestThrottle, RestCatalogClient};
use catalog_sync::sync::ReconciliationDriver;
use catalog_sync::SyncConfig;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,catalog_sync=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::from(2));
        }
    };
    let timeout = Duration::from_secs(config.timeout_secs);

    let source = RestCatalogClient::new(
        "source",
        &config.source,
        timeout,
        RequestThrottle::per_second(config.requests_per_second),
    )
    .context("building source client")?;
    let target = RestCatalogClient::new(
        "target",
        &config.target,
        timeout,
        RequestThrottle::per_second(config.requests_per_second),
    )
    .context("building target client")?;

    info!(
        "Syncing company {} ({}) into company {} ({})",
        config.source.company_id,
        source.base_url(),
        config.target.company_id,
        target.base_url()
    );

    let report = match ReconciliationDriver::new(&config, &source, &target).run().await {
        Ok(report) => report,
        Err(e) => {
            error!("Sync run aborted: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    info!("{}", report);

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
