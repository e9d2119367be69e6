use chrono::NaiveDateTime;
use serde::Serializer;
use slug::slugify as make_slug;

use crate::types::ValidationError;

pub const DEFAULT_LIMIT: i64 = 20;
pub const DEFAULT_OFFSET: i64 = 0;

pub fn slugify(title: &str) -> String {
    make_slug(title)
}

// Resolves pagination input against the defaults; negative values never
// reach the store.
pub fn page_params(
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<(i64, i64), ValidationError> {
    let mut error = ValidationError::default();
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let offset = offset.unwrap_or(DEFAULT_OFFSET);
    if limit < 0 {
        error.add_error("limit", "limit must be a non-negative integer");
    }
    if offset < 0 {
        error.add_error("offset", "offset must be a non-negative integer");
    }
    if error.empty() {
        Ok((limit, offset))
    } else {
        Err(error)
    }
}

pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    serializer.serialize_str(&s)
}
