//! Incremental paginated sweep shared by every CRM entity type.

pub mod companies;
pub mod contacts;
pub mod meetings;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hubsync_db::tenant::models::{default_watermark, CrmAccount, EntityKind};

use crate::action::Action;
use crate::buffer::ActionBuffer;
use crate::error::SyncError;
use crate::hubspot::client::HubSpotClient;
use crate::hubspot::models::CrmObject;
use crate::hubspot::query::build_search_request;
use crate::hubspot::token::TokenManager;

/// The search API rejects page tokens at or beyond this offset.
pub const PAGE_TOKEN_LIMIT: u64 = 9900;

/// Everything a sweep needs to talk to HubSpot on behalf of one account.
pub struct SweepContext<'a> {
    pub client: &'a HubSpotClient,
    pub tokens: &'a mut TokenManager,
    pub account: &'a mut CrmAccount,
}

/// Per-entity pieces plugged into [`run_sweep`].
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    /// Related-entity lookups for one page.
    type Associations: Send + Sync;

    fn kind(&self) -> EntityKind;

    /// Path segment of the search endpoint, e.g. `contacts`.
    fn object_type(&self) -> &'static str;

    /// Property the window filter and sort apply to.
    fn filter_property(&self) -> &'static str;

    fn properties(&self) -> &'static [&'static str];

    async fn resolve_associations(
        &self,
        ctx: &mut SweepContext<'_>,
        records: &[CrmObject],
    ) -> Result<Self::Associations, SyncError>;

    /// Turn one record into an action, or `None` to skip it.
    fn normalize(
        &self,
        record: &CrmObject,
        associations: &Self::Associations,
        watermark: DateTime<Utc>,
    ) -> Option<Action>;
}

/// Pagination state for one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub after: Option<String>,
    pub lower_bound: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    /// Continue with the next page token.
    Next,
    /// Page token limit hit: restart from offset 0 with a later lower bound.
    Rollover,
    Done,
}

impl Cursor {
    pub fn new(lower_bound: DateTime<Utc>) -> Self {
        Self {
            after: None,
            lower_bound,
        }
    }

    /// Move past the page just fetched.
    ///
    /// A next-page token that is missing or not a positive integer ends the
    /// sweep. Errors when a rollover cannot move the lower bound forward.
    pub fn advance(
        &mut self,
        next_after: Option<&str>,
        last_record: Option<&CrmObject>,
    ) -> Result<CursorStep, String> {
        let Some(offset) = next_after
            .and_then(|a| a.trim().parse::<u64>().ok())
            .filter(|o| *o > 0)
        else {
            self.after = None;
            return Ok(CursorStep::Done);
        };

        if offset < PAGE_TOKEN_LIMIT {
            self.after = Some(offset.to_string());
            return Ok(CursorStep::Next);
        }

        let Some(last) = last_record else {
            return Err(format!("page token {offset} reached on an empty page"));
        };
        if last.updated_at <= self.lower_bound {
            return Err(format!(
                "cursor rollover stalled at {}",
                self.lower_bound.to_rfc3339()
            ));
        }

        self.after = None;
        self.lower_bound = last.updated_at;
        Ok(CursorStep::Rollover)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub pages: usize,
    pub records: usize,
    pub actions: usize,
    pub rollovers: usize,
}

/// Sweep every record modified in `[watermark, now]`, pushing actions into
/// `buffer`. The account's watermark moves to the sweep start time only when
/// the whole sweep succeeds.
pub async fn run_sweep<F: EntityFetcher>(
    fetcher: &F,
    ctx: &mut SweepContext<'_>,
    buffer: &mut ActionBuffer,
) -> Result<SweepOutcome, SyncError> {
    let kind = fetcher.kind();
    let watermark = ctx
        .account
        .last_pulled
        .get(kind)
        .unwrap_or_else(default_watermark);
    let now = Utc::now();
    let page_size = ctx.client.config().page_size;

    let mut cursor = Cursor::new(watermark);
    let mut outcome = SweepOutcome::default();

    loop {
        let request = build_search_request(
            fetcher.filter_property(),
            fetcher.properties(),
            cursor.lower_bound,
            now,
            page_size,
            cursor.after.as_deref(),
        );

        let client = ctx.client;
        let object_type = fetcher.object_type();
        let request = &request;
        let page = ctx
            .tokens
            .execute_with_retry(ctx.account, move |token| async move {
                client.search(object_type, request, &token).await
            })
            .await?;

        outcome.pages += 1;
        outcome.records += page.results.len();
        tracing::info!(
            hub_id = %ctx.account.hub_id,
            entity = %kind,
            count = page.results.len(),
            "processing batch"
        );

        if !page.results.is_empty() {
            let associations = fetcher.resolve_associations(ctx, &page.results).await?;
            for record in &page.results {
                if let Some(action) = fetcher.normalize(record, &associations, watermark) {
                    buffer.push(action)?;
                    outcome.actions += 1;
                }
            }
        }

        let step = cursor
            .advance(page.next_after(), page.results.last())
            .map_err(|reason| SyncError::EntitySweep {
                entity: kind,
                reason,
            })?;

        match step {
            CursorStep::Next => {}
            CursorStep::Rollover => {
                outcome.rollovers += 1;
                tracing::info!(
                    hub_id = %ctx.account.hub_id,
                    entity = %kind,
                    lower_bound = %cursor.lower_bound,
                    "page token limit reached, narrowing window"
                );
            }
            CursorStep::Done => break,
        }
    }

    ctx.account.last_pulled.set(kind, now);
    Ok(outcome)
}

/// `createdAt` after the watermark means the record is new since the last sweep.
pub(crate) fn created_since(record: &CrmObject, watermark: DateTime<Utc>) -> bool {
    record.created_at > watermark
}
