use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{AppError, Result};

/// Parses a scheduled time and requires it to lie in the future.
///
/// Accepts RFC 3339 timestamps as well as the zone-less form an HTML
/// `datetime-local` input produces; zone-less times are taken as UTC.
///
/// # Arguments
///
/// * `raw` - The client-supplied timestamp.
///
/// # Returns
///
/// A `Result` containing the parsed UTC time.
pub fn parse_future_time(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
                .map(|naive| naive.and_utc())
        })
        .map_err(|_| AppError::Validation("Invalid datetime format".to_string()))?;

    if parsed < Utc::now() {
        return Err(AppError::Validation(
            "Scheduled time must be in the future".to_string(),
        ));
    }

    Ok(parsed)
}
