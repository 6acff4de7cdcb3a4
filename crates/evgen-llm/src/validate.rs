//! Per-record semantic checks for candidate events.

use chrono::NaiveDateTime;
use evgen_core::{CandidateRecord, Coordinates};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// The parts of a candidate that survived validation in typed form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRecord {
    pub date: NaiveDateTime,
    pub location: Coordinates,
}

/// Accepts `YYYY-MM-DDTHH:mm`, with optional seconds and fraction.
pub fn parse_local_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Past dates are accepted; only syntax is checked.
pub fn validate(candidate: &CandidateRecord) -> Result<ValidRecord, String> {
    if candidate.title.trim().is_empty() {
        return Err("title is blank".to_string());
    }
    if candidate.description.trim().is_empty() {
        return Err("description is blank".to_string());
    }
    let Some(location) = candidate.location else {
        return Err("location is missing".to_string());
    };
    if !location.latitude_in_range() {
        return Err(format!(
            "latitude {} is outside [-90, 90]",
            location.latitude
        ));
    }
    if !location.longitude_in_range() {
        return Err(format!(
            "longitude {} is outside [-180, 180]",
            location.longitude
        ));
    }
    let date = parse_local_date_time(&candidate.date).ok_or_else(|| {
        format!(
            "date '{}' is not a local date-time (YYYY-MM-DDTHH:mm[:ss])",
            candidate.date
        )
    })?;

    Ok(ValidRecord { date, location })
}
