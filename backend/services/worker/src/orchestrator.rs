use std::sync::Arc;

use hubsync_db::tenant::models::{CrmAccount, EntityKind};
use hubsync_db::tenant::repositories::TenantRepository;
use uuid::Uuid;

use crate::buffer::{ActionBuffer, DEFAULT_BATCH_SIZE};
use crate::error::SyncError;
use crate::hubspot::client::HubSpotClient;
use crate::hubspot::token::TokenManager;
use crate::sink::ActionSink;
use crate::sweep::companies::CompanyFetcher;
use crate::sweep::contacts::ContactFetcher;
use crate::sweep::meetings::MeetingFetcher;
use crate::sweep::{run_sweep, EntityFetcher, SweepContext};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Buffer threshold before a background flush is detached.
    pub batch_size: usize,
    /// When false, account state is never written back.
    pub persist_watermarks: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            persist_watermarks: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub tenant_id: Uuid,
    pub accounts: Vec<AccountOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountOutcome {
    pub hub_id: String,
    pub refreshed: bool,
    pub succeeded: Vec<EntityKind>,
    pub failed: Vec<EntityKind>,
    pub actions_delivered: usize,
    pub drained: bool,
    pub saved: bool,
}

impl AccountOutcome {
    fn new(hub_id: &str) -> Self {
        Self {
            hub_id: hub_id.to_string(),
            refreshed: false,
            succeeded: Vec::new(),
            failed: Vec::new(),
            actions_delivered: 0,
            drained: false,
            saved: false,
        }
    }
}

/// Sweeps every account of the tenant, one account at a time.
pub struct SyncOrchestrator<R> {
    repo: R,
    client: HubSpotClient,
    sink: Arc<dyn ActionSink>,
    settings: SyncSettings,
}

impl<R> SyncOrchestrator<R>
where
    R: TenantRepository,
{
    pub fn new(
        repo: R,
        client: HubSpotClient,
        sink: Arc<dyn ActionSink>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            repo,
            client,
            sink,
            settings,
        }
    }

    /// Load the tenant and sweep its accounts in order.
    ///
    /// Only a failure to load the tenant is returned as an error; account
    /// and entity failures are logged and recorded in the summary.
    pub async fn run(&self) -> Result<RunSummary, SyncError> {
        tracing::info!("starting tenant sweep");

        let tenant = match self.repo.find_one().await {
            Ok(tenant) => tenant,
            Err(e) => {
                tracing::error!(error = %e, "failed to load tenant");
                return Err(SyncError::FatalLoad(e));
            }
        };

        tracing::info!(
            tenant_id = %tenant.id,
            name = %tenant.name,
            accounts = tenant.accounts.len(),
            "tenant loaded"
        );

        let mut summary = RunSummary {
            tenant_id: tenant.id,
            accounts: Vec::with_capacity(tenant.accounts.len()),
        };

        for mut account in tenant.accounts {
            let outcome = self.process_account(tenant.id, &mut account).await;
            summary.accounts.push(outcome);
        }

        tracing::info!(
            tenant_id = %summary.tenant_id,
            accounts = summary.accounts.len(),
            "tenant sweep finished"
        );
        Ok(summary)
    }

    async fn process_account(&self, tenant_id: Uuid, account: &mut CrmAccount) -> AccountOutcome {
        let mut outcome = AccountOutcome::new(&account.hub_id);
        tracing::info!(hub_id = %account.hub_id, "starting account sweep");

        let mut tokens = TokenManager::new(self.client.clone());
        if let Err(e) = tokens.refresh(account).await {
            tracing::error!(hub_id = %account.hub_id, error = %e, "skipping account");
            return outcome;
        }
        outcome.refreshed = true;
        tracing::debug!(hub_id = %account.hub_id, expires_at = ?tokens.expires_at(), "access token ready");

        let previous = account.last_pulled.clone();
        let mut buffer = ActionBuffer::new(
            account.hub_id.clone(),
            Arc::clone(&self.sink),
            self.settings.batch_size,
        );

        {
            let mut ctx = SweepContext {
                client: &self.client,
                tokens: &mut tokens,
                account: &mut *account,
            };
            sweep_entity(&ContactFetcher, &mut ctx, &mut buffer, &mut outcome).await;
            sweep_entity(&CompanyFetcher, &mut ctx, &mut buffer, &mut outcome).await;
            sweep_entity(&MeetingFetcher, &mut ctx, &mut buffer, &mut outcome).await;
        }

        match buffer.drain().await {
            Ok(delivered) if buffer.flush_failures() == 0 => {
                outcome.drained = true;
                tracing::info!(
                    hub_id = %account.hub_id,
                    pushed = buffer.pushed(),
                    delivered,
                    "buffer drained"
                );
            }
            Ok(_) => {
                tracing::error!(
                    hub_id = %account.hub_id,
                    failures = buffer.flush_failures(),
                    "earlier flushes failed, restoring watermarks"
                );
            }
            Err(source) => {
                let e = SyncError::Flush(source);
                tracing::error!(
                    hub_id = %account.hub_id,
                    error = %e,
                    "drain failed, restoring watermarks"
                );
            }
        }
        outcome.actions_delivered = buffer.delivered();

        if !outcome.drained {
            account.last_pulled = previous;
        }

        outcome.saved = self.save(tenant_id, account).await;

        tracing::info!(
            hub_id = %account.hub_id,
            succeeded = ?outcome.succeeded,
            failed = ?outcome.failed,
            delivered = outcome.actions_delivered,
            "account sweep finished"
        );
        outcome
    }

    async fn save(&self, tenant_id: Uuid, account: &CrmAccount) -> bool {
        if !self.settings.persist_watermarks {
            tracing::debug!(hub_id = %account.hub_id, "watermark persistence disabled, not saving");
            return false;
        }

        match self.repo.save_account(tenant_id, account).await {
            Ok(()) => true,
            Err(source) => {
                let e = SyncError::Persist {
                    hub_id: account.hub_id.clone(),
                    source,
                };
                tracing::error!(error = %e, "failed to save account");
                false
            }
        }
    }
}

/// Run one entity sweep, recording the result without propagating failure.
async fn sweep_entity<F: EntityFetcher>(
    fetcher: &F,
    ctx: &mut SweepContext<'_>,
    buffer: &mut ActionBuffer,
    outcome: &mut AccountOutcome,
) {
    let kind = fetcher.kind();
    match run_sweep(fetcher, ctx, buffer).await {
        Ok(sweep) => {
            tracing::info!(
                hub_id = %ctx.account.hub_id,
                entity = %kind,
                pages = sweep.pages,
                records = sweep.records,
                actions = sweep.actions,
                rollovers = sweep.rollovers,
                "entity sweep succeeded"
            );
            outcome.succeeded.push(kind);
        }
        Err(e) => {
            tracing::error!(
                hub_id = %ctx.account.hub_id,
                entity = %kind,
                error = %e,
                "entity sweep failed"
            );
            outcome.failed.push(kind);
        }
    }
}
