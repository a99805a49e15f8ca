#![allow(clippy::result_large_err)]

use chrono::{Datelike, Utc};
use dotenvy::dotenv;
use tani_market::{
    app::AppContext,
    config::settings::load_default_config,
    core::{region, report},
    errors::{Error, Result},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the main application configuration
    let app_config = load_default_config()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;

    // 4. Connect, ensure schema, build collaborators
    let ctx = AppContext::from_config(app_config)
        .await
        .inspect_err(|e| error!("Failed to initialize application: {}", e))?;

    // 5. Summarize the current state
    let regions = ctx.bounded("list_regions", region::list_regions(&ctx.database)).await?;
    let year = Utc::now().year();
    let summary = ctx
        .bounded("yearly_report", report::generate_yearly_report(&ctx.database, year, None))
        .await?;
    let rendered = serde_json::to_string_pretty(&summary).map_err(|e| Error::Internal {
        message: format!("Failed to render report: {e}"),
    })?;

    info!(regions = regions.len(), "Marketplace core ready.");
    info!("Transactions in {year}:\n{rendered}");

    Ok(())
}
