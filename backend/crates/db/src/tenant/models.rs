use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The CRM object types swept for every account, in sweep order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Contacts,
    Companies,
    Meetings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Contacts,
        EntityKind::Companies,
        EntityKind::Meetings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Contacts => "contacts",
            EntityKind::Companies => "companies",
            EntityKind::Meetings => "meetings",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bound used when an account has never been swept for an entity type.
pub fn default_watermark() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPulledDates {
    pub contacts: Option<DateTime<Utc>>,
    pub companies: Option<DateTime<Utc>>,
    pub meetings: Option<DateTime<Utc>>,
}

impl LastPulledDates {
    pub fn get(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        match kind {
            EntityKind::Contacts => self.contacts,
            EntityKind::Companies => self.companies,
            EntityKind::Meetings => self.meetings,
        }
    }

    pub fn set(&mut self, kind: EntityKind, at: DateTime<Utc>) {
        let slot = match kind {
            EntityKind::Contacts => &mut self.contacts,
            EntityKind::Companies => &mut self.companies,
            EntityKind::Meetings => &mut self.meetings,
        };
        *slot = Some(at);
    }
}

/// One connected HubSpot portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmAccount {
    pub id: Uuid,
    pub hub_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub last_pulled: LastPulledDates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub accounts: Vec<CrmAccount>,
}
