mod catalog;
mod memberships;
mod recipes;
mod users;

use chrono::{SecondsFormat, Utc};

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Comma-separated `?` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
