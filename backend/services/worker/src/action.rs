use chrono::{DateTime, Utc};
use serde::Serialize;

/// A created-or-updated CRM entity, ready for the downstream sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub action_name: String,
    pub action_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub include_in_analytics: u8,
    #[serde(flatten)]
    pub properties: ActionProperties,
}

impl Action {
    pub fn new(
        action_name: impl Into<String>,
        action_date: DateTime<Utc>,
        identity: Option<String>,
        properties: ActionProperties,
    ) -> Self {
        Self {
            action_name: action_name.into(),
            action_date,
            identity,
            include_in_analytics: 0,
            properties,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ActionProperties {
    #[serde(rename = "companyProperties")]
    Company(CompanyProperties),
    #[serde(rename = "userProperties")]
    User(UserProperties),
    #[serde(rename = "meetingProperties")]
    Meeting(MeetingProperties),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyProperties {
    pub company_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_status: Option<String>,
    pub contact_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingProperties {
    pub meeting_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_flat_with_scoped_bag() {
        let action = Action::new(
            "Company Created",
            Utc.with_ymd_and_hms(2026, 2, 10, 10, 0, 0).unwrap(),
            None,
            ActionProperties::Company(CompanyProperties {
                company_id: "101".to_string(),
                company_domain: Some("acme.io".to_string()),
                company_industry: None,
            }),
        );

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["actionName"], "Company Created");
        assert_eq!(json["includeInAnalytics"], 0);
        assert_eq!(json["companyProperties"]["company_id"], "101");
        assert_eq!(json["companyProperties"]["company_domain"], "acme.io");
        assert!(json["companyProperties"].get("company_industry").is_none());
        assert!(json.get("identity").is_none());
        assert!(json.get("userProperties").is_none());
    }

    #[test]
    fn user_bag_keeps_zero_score() {
        let action = Action::new(
            "Contact Updated",
            Utc::now(),
            Some("ada@example.com".to_string()),
            ActionProperties::User(UserProperties {
                company_id: None,
                contact_name: Some("Ada Lovelace".to_string()),
                contact_title: None,
                contact_source: None,
                contact_status: None,
                contact_score: 0,
            }),
        );

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["identity"], "ada@example.com");
        assert_eq!(json["userProperties"]["contact_score"], 0);
        assert!(json["userProperties"].get("company_id").is_none());
    }
}
