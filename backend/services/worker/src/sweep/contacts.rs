use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hubsync_db::tenant::models::EntityKind;

use super::{created_since, EntityFetcher, SweepContext};
use crate::action::{Action, ActionProperties, UserProperties};
use crate::error::SyncError;
use crate::filtering::{clean, parse_score};
use crate::hubspot::models::{AssociationResult, CrmObject};

const PROPERTIES: &[&str] = &[
    "firstname",
    "lastname",
    "jobtitle",
    "email",
    "hubspotscore",
    "hs_lead_status",
    "hs_analytics_source",
    "hs_latest_source",
];

pub struct ContactFetcher;

/// Contact id to the id of its first associated company.
pub type CompanyByContact = HashMap<String, String>;

#[async_trait]
impl EntityFetcher for ContactFetcher {
    type Associations = CompanyByContact;

    fn kind(&self) -> EntityKind {
        EntityKind::Contacts
    }

    fn object_type(&self) -> &'static str {
        "contacts"
    }

    fn filter_property(&self) -> &'static str {
        "lastmodifieddate"
    }

    fn properties(&self) -> &'static [&'static str] {
        PROPERTIES
    }

    async fn resolve_associations(
        &self,
        ctx: &mut SweepContext<'_>,
        records: &[CrmObject],
    ) -> Result<CompanyByContact, SyncError> {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let client = ctx.client;
        let ids = &ids;

        let results = ctx
            .tokens
            .execute_with_retry(ctx.account, move |token| async move {
                client
                    .batch_read_associations("CONTACTS", "COMPANIES", ids, &token)
                    .await
            })
            .await?;

        Ok(first_targets(results))
    }

    fn normalize(
        &self,
        record: &CrmObject,
        companies: &CompanyByContact,
        watermark: DateTime<Utc>,
    ) -> Option<Action> {
        let email = record.property("email").filter(|e| !e.trim().is_empty())?;

        let created = created_since(record, watermark);
        let (name, date) = if created {
            ("Contact Created", record.created_at)
        } else {
            ("Contact Updated", record.updated_at)
        };

        let full_name = format!(
            "{} {}",
            record.property("firstname").unwrap_or_default(),
            record.property("lastname").unwrap_or_default()
        );

        Some(Action::new(
            name,
            date,
            Some(email),
            ActionProperties::User(UserProperties {
                company_id: companies.get(&record.id).cloned(),
                contact_name: clean(Some(full_name.trim().to_string())),
                contact_title: clean(record.property("jobtitle")),
                contact_source: clean(record.property("hs_analytics_source")),
                contact_status: clean(record.property("hs_lead_status")),
                contact_score: parse_score(record.property("hubspotscore").as_deref()),
            }),
        ))
    }
}

/// Map each association source to its first target, dropping sources with none.
pub(crate) fn first_targets(results: Vec<AssociationResult>) -> HashMap<String, String> {
    results
        .into_iter()
        .filter_map(|r| r.to.into_iter().next().map(|to| (r.from.id, to.id)))
        .collect()
}
