use hubsync_common::error::HubsyncError;
use hubsync_db::tenant::models::EntityKind;

use crate::hubspot::client::HubSpotClientError;
use crate::sink::SinkError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Token refresh failed; the account's remaining work is abandoned.
    #[error("token refresh failed for hub {hub_id}: {source}")]
    Auth {
        hub_id: String,
        #[source]
        source: HubSpotClientError,
    },

    #[error("hubspot call failed after {attempts} attempts: {source}")]
    RemoteCall {
        attempts: u32,
        #[source]
        source: HubSpotClientError,
    },

    #[error("{entity} sweep failed: {reason}")]
    EntitySweep { entity: EntityKind, reason: String },

    #[error("flush to sink failed: {0}")]
    Flush(#[from] SinkError),

    #[error("failed to load tenant: {0}")]
    FatalLoad(#[source] HubsyncError),

    #[error("failed to persist account {hub_id}: {source}")]
    Persist {
        hub_id: String,
        #[source]
        source: HubsyncError,
    },
}
