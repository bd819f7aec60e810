use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hubsync_db::tenant::models::EntityKind;

use super::{created_since, EntityFetcher, SweepContext};
use crate::action::{Action, ActionProperties, CompanyProperties};
use crate::error::SyncError;
use crate::filtering::clean;
use crate::hubspot::models::CrmObject;

const PROPERTIES: &[&str] = &[
    "name",
    "domain",
    "country",
    "industry",
    "description",
    "annualrevenue",
    "numberofemployees",
    "hs_lead_status",
];

/// Company actions are back-dated by this much.
const ACTION_DATE_SKEW_MS: i64 = 2000;

pub struct CompanyFetcher;

#[async_trait]
impl EntityFetcher for CompanyFetcher {
    type Associations = ();

    fn kind(&self) -> EntityKind {
        EntityKind::Companies
    }

    fn object_type(&self) -> &'static str {
        "companies"
    }

    fn filter_property(&self) -> &'static str {
        "hs_lastmodifieddate"
    }

    fn properties(&self) -> &'static [&'static str] {
        PROPERTIES
    }

    async fn resolve_associations(
        &self,
        _ctx: &mut SweepContext<'_>,
        _records: &[CrmObject],
    ) -> Result<(), SyncError> {
        Ok(())
    }

    fn normalize(
        &self,
        record: &CrmObject,
        _associations: &(),
        watermark: DateTime<Utc>,
    ) -> Option<Action> {
        record.properties.as_ref()?;

        let created = created_since(record, watermark);
        let (name, date) = if created {
            ("Company Created", record.created_at)
        } else {
            ("Company Updated", record.updated_at)
        };

        Some(Action::new(
            name,
            date - Duration::milliseconds(ACTION_DATE_SKEW_MS),
            None,
            ActionProperties::Company(CompanyProperties {
                company_id: record.id.clone(),
                company_domain: clean(record.property("domain")),
                company_industry: clean(record.property("industry")),
            }),
        ))
    }
}
