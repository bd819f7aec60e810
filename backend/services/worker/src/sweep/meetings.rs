use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use hubsync_db::tenant::models::EntityKind;
use tokio::task::JoinSet;

use super::contacts::first_targets;
use super::{created_since, EntityFetcher, SweepContext};
use crate::action::{Action, ActionProperties, MeetingProperties};
use crate::error::SyncError;
use crate::filtering::clean;
use crate::hubspot::models::CrmObject;

const PROPERTIES: &[&str] = &[
    "hs_meeting_title",
    "hs_meeting_start_time",
    "hs_meeting_end_time",
    "hs_meeting_outcome",
];

pub struct MeetingFetcher;

/// Attendee lookups for one page of meetings.
#[derive(Debug, Default, Clone)]
pub struct MeetingAttendees {
    /// Meeting id to the id of its first associated contact.
    pub contact_by_meeting: HashMap<String, String>,
    /// Contact id to email, for contacts whose lookup succeeded.
    pub email_by_contact: HashMap<String, String>,
}

#[async_trait]
impl EntityFetcher for MeetingFetcher {
    type Associations = MeetingAttendees;

    fn kind(&self) -> EntityKind {
        EntityKind::Meetings
    }

    fn object_type(&self) -> &'static str {
        "meetings"
    }

    fn filter_property(&self) -> &'static str {
        "hs_lastmodifieddate"
    }

    fn properties(&self) -> &'static [&'static str] {
        PROPERTIES
    }

    /// Attendee failures never fail the sweep: a failed association read
    /// yields no attendees and a failed email lookup leaves that email out.
    async fn resolve_associations(
        &self,
        ctx: &mut SweepContext<'_>,
        records: &[CrmObject],
    ) -> Result<MeetingAttendees, SyncError> {
        let hub_id = ctx.account.hub_id.as_str();
        let token = ctx.tokens.access_token().to_string();
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let contact_by_meeting = match ctx
            .client
            .batch_read_associations("MEETINGS", "CONTACTS", &ids, &token)
            .await
        {
            Ok(results) => first_targets(results),
            Err(e) => {
                tracing::error!(hub_id, error = %e, "error fetching meeting attendees");
                HashMap::new()
            }
        };

        let unique: BTreeSet<&String> = contact_by_meeting.values().collect();
        let mut lookups = JoinSet::new();
        for contact_id in unique {
            let client = ctx.client.clone();
            let token = token.clone();
            let contact_id = contact_id.clone();
            lookups.spawn(async move {
                let email = client.contact_email(&contact_id, &token).await;
                (contact_id, email)
            });
        }

        let mut email_by_contact = HashMap::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((contact_id, Ok(Some(email)))) => {
                    email_by_contact.insert(contact_id, email);
                }
                Ok((_, Ok(None))) => {}
                Ok((contact_id, Err(e))) => {
                    tracing::error!(hub_id, contact_id = %contact_id, error = %e, "failed to fetch contact details");
                }
                Err(e) => {
                    tracing::error!(hub_id, error = %e, "contact lookup task failed");
                }
            }
        }

        Ok(MeetingAttendees {
            contact_by_meeting,
            email_by_contact,
        })
    }

    fn normalize(
        &self,
        record: &CrmObject,
        attendees: &MeetingAttendees,
        watermark: DateTime<Utc>,
    ) -> Option<Action> {
        record.properties.as_ref()?;

        let contact_id = attendees.contact_by_meeting.get(&record.id).cloned();
        let identity = contact_id
            .as_ref()
            .and_then(|id| attendees.email_by_contact.get(id))
            .cloned();

        let created = created_since(record, watermark);
        let (name, date) = if created {
            ("Meeting Created", record.created_at)
        } else {
            ("Meeting Updated", record.updated_at)
        };

        Some(Action::new(
            name,
            date,
            identity,
            ActionProperties::Meeting(MeetingProperties {
                meeting_id: record.id.clone(),
                meeting_title: clean(record.property("hs_meeting_title")),
                meeting_start_time: epoch_millis_to_iso(record.property("hs_meeting_start_time")),
                meeting_end_time: epoch_millis_to_iso(record.property("hs_meeting_end_time")),
                meeting_outcome: clean(record.property("hs_meeting_outcome")),
                contact_id,
            }),
        ))
    }
}

/// `"1767225600000"` becomes `"2026-01-01T00:00:00.000Z"`. Unparseable values are dropped.
fn epoch_millis_to_iso(value: Option<String>) -> Option<String> {
    let millis = value?.trim().parse::<i64>().ok()?;
    let at = Utc.timestamp_millis_opt(millis).single()?;
    Some(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}
