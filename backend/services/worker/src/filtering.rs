//! Property cleanup applied to every action property bag.

/// Placeholder values HubSpot users type into fields instead of leaving them blank.
pub const DISALLOWED_VALUES: [&str; 8] = [
    "[not provided]",
    "placeholder",
    "[[unknown]]",
    "not set",
    "not provided",
    "unknown",
    "undefined",
    "n/a",
];

/// Marker left behind by unresolved HubSpot personalization tokens.
const UNRESOLVED_TOKEN_MARKER: &str = "!$record";

/// Whether a raw property value carries real information.
pub fn is_meaningful(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    let lower = value.to_lowercase();
    !DISALLOWED_VALUES.contains(&lower.as_str()) && !lower.contains(UNRESOLVED_TOKEN_MARKER)
}

/// Drop empty and placeholder values.
pub fn clean(value: Option<String>) -> Option<String> {
    value.filter(|v| is_meaningful(v))
}

/// Parse an integer property, falling back to zero.
pub fn parse_score(value: Option<&str>) -> i64 {
    value
        .and_then(|v| {
            let v = v.trim();
            v.parse::<i64>()
                .ok()
                .or_else(|| v.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        })
        .unwrap_or(0)
}
