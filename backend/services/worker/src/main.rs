mod action;
mod buffer;
mod error;
mod filtering;
mod hubspot;
mod orchestrator;
mod sink;
mod sweep;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use hubsync_config::{init_tracing, AppConfig};
use hubsync_db::tenant::pg_repository::PgTenantRepository;

use crate::hubspot::client::{HubSpotClient, HubSpotConfig};
use crate::orchestrator::{SyncOrchestrator, SyncSettings};
use crate::sink::{ActionSink, HttpSink, LogSink};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing("info");

    tracing::info!(service = "hubsync-worker", "starting");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "worker failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;

    let hubspot_config = match HubSpotConfig::from_env() {
        Ok(Some(hubspot_config)) => hubspot_config,
        Ok(None) => {
            tracing::info!("no hubspot credentials found, skipping sync");
            return Ok(());
        }
        Err(e) => anyhow::bail!("hubspot configuration error: {e}"),
    };

    let pool = hubsync_db::create_pool(&config.database_url)
        .await
        .context("connecting to database")?;
    let repo = PgTenantRepository::new(pool);

    let client = HubSpotClient::new(hubspot_config).context("building hubspot client")?;

    let sink: Arc<dyn ActionSink> = match config.sink_url.clone() {
        Some(url) => {
            tracing::info!(url = %url, "delivering actions over http");
            Arc::new(HttpSink::new(url, config.sink_api_key.clone()).context("building sink")?)
        }
        None => {
            tracing::warn!("SINK_URL not set, actions will only be logged");
            Arc::new(LogSink)
        }
    };

    let orchestrator = SyncOrchestrator::new(
        repo,
        client,
        sink,
        SyncSettings {
            batch_size: config.batch_size,
            persist_watermarks: config.persist_watermarks,
        },
    );

    let summary = orchestrator.run().await?;
    for account in &summary.accounts {
        tracing::info!(
            tenant_id = %summary.tenant_id,
            hub_id = %account.hub_id,
            refreshed = account.refreshed,
            succeeded = ?account.succeeded,
            failed = ?account.failed,
            delivered = account.actions_delivered,
            drained = account.drained,
            saved = account.saved,
            "account summary"
        );
    }
    tracing::info!(tenant_id = %summary.tenant_id, "sync completed");
    Ok(())
}
