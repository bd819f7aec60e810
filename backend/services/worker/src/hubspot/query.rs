use chrono::{DateTime, Utc};

use super::models::{Filter, FilterGroup, SearchRequest, Sort};

/// Build the `[lower, upper]` last-modified window filter.
pub fn last_modified_filter(
    property: &str,
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
) -> FilterGroup {
    FilterGroup {
        filters: vec![
            Filter {
                property_name: property.to_string(),
                operator: "GTE".to_string(),
                value: lower.timestamp_millis().to_string(),
            },
            Filter {
                property_name: property.to_string(),
                operator: "LTE".to_string(),
                value: upper.timestamp_millis().to_string(),
            },
        ],
    }
}

/// Build one search page request sorted ascending by `property`.
pub fn build_search_request(
    property: &str,
    properties: &[&str],
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
    limit: u32,
    after: Option<&str>,
) -> SearchRequest {
    SearchRequest {
        filter_groups: vec![last_modified_filter(property, lower, upper)],
        sorts: vec![Sort {
            property_name: property.to_string(),
            direction: "ASCENDING".to_string(),
        }],
        properties: properties.iter().map(|p| p.to_string()).collect(),
        limit,
        after: after.map(str::to_string),
    }
}
