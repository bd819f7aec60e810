use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hubsync_db::tenant::models::CrmAccount;

use super::client::{HubSpotClient, HubSpotClientError};
use crate::error::SyncError;

/// Owns the OAuth access token for one HubSpot account.
///
/// Built per account and never shared, so the tracked expiry always belongs
/// to the account being swept.
pub struct TokenManager {
    client: HubSpotClient,
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
    max_attempts: u32,
    base_delay: Duration,
}

impl TokenManager {
    pub fn new(client: HubSpotClient) -> Self {
        let max_attempts = client.config().max_attempts.max(1);
        let base_delay = Duration::from_millis(client.config().retry_base_ms);
        Self {
            client,
            access_token: String::new(),
            expires_at: None,
            max_attempts,
            base_delay,
        }
    }

    /// For testing: start from a known token and expiry.
    #[cfg(test)]
    pub fn with_token(mut self, access_token: &str, expires_at: DateTime<Utc>) -> Self {
        self.access_token = access_token.to_string();
        self.expires_at = Some(expires_at);
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// A token with no recorded expiry counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now > at)
    }

    /// Exchange the account's refresh token for a new access token.
    ///
    /// The account's stored access token is only rewritten when it changed.
    pub async fn refresh(&mut self, account: &mut CrmAccount) -> Result<(), SyncError> {
        let token = match self
            .client
            .refresh_access_token(&account.refresh_token)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(hub_id = %account.hub_id, error = %e, "error refreshing access token");
                return Err(SyncError::Auth {
                    hub_id: account.hub_id.clone(),
                    source: e,
                });
            }
        };

        self.expires_at = expiry_after(Utc::now(), token.expires_in);
        if self.expires_at.is_none() {
            tracing::warn!(
                hub_id = %account.hub_id,
                expires_in = token.expires_in,
                "unusable token lifetime, treating token as expired"
            );
        }
        self.access_token = token.access_token;

        if self.access_token != account.access_token {
            account.access_token = self.access_token.clone();
        }
        if let Some(rotated) = token.refresh_token {
            if rotated != account.refresh_token {
                account.refresh_token = rotated;
            }
        }

        tracing::debug!(hub_id = %account.hub_id, expires_at = ?self.expires_at, "access token refreshed");
        Ok(())
    }

    /// Run `operation` with the current access token, retrying failures.
    ///
    /// Every failure is assumed to be an expired token: once past the tracked
    /// expiry the token is refreshed before the next attempt, whatever the
    /// error was. Attempts back off by `base * 2^attempt` without jitter and
    /// the last error is returned after `max_attempts` failures.
    pub async fn execute_with_retry<T, F, Fut>(
        &mut self,
        account: &mut CrmAccount,
        mut operation: F,
    ) -> Result<T, SyncError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, HubSpotClientError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let error = match operation(self.access_token.clone()).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(hub_id = %account.hub_id, retries = attempt, "hubspot call succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            attempt += 1;
            tracing::warn!(
                hub_id = %account.hub_id,
                attempt,
                max_attempts = self.max_attempts,
                error = %error,
                "hubspot call failed"
            );

            if self.is_expired(Utc::now()) {
                self.refresh(account).await?;
            }

            if attempt >= self.max_attempts {
                return Err(SyncError::RemoteCall {
                    attempts: attempt,
                    source: error,
                });
            }

            let backoff = self.backoff(attempt);
            tracing::debug!(hub_id = %account.hub_id, backoff_ms = backoff.as_millis() as u64, "retrying after backoff");
            tokio::time::sleep(backoff).await;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// `None` when `expires_in` is out of range, so the token counts as expired.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    chrono::TimeDelta::try_seconds(expires_in).and_then(|lifetime| now.checked_add_signed(lifetime))
}
