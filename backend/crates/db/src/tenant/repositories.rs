use async_trait::async_trait;
use uuid::Uuid;

use crate::tenant::models::{CrmAccount, Tenant};
use hubsync_common::error::HubsyncResult;

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Load the tenant to sweep together with all of its connected accounts.
    /// Returns `NotFound` if no tenant exists.
    async fn find_one(&self) -> HubsyncResult<Tenant>;

    /// Persist the token pair and per-entity watermarks of one account.
    async fn save_account(&self, tenant_id: Uuid, account: &CrmAccount) -> HubsyncResult<()>;
}
