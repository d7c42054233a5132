use log::debug;
use std::time::Duration;

pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX_VALIDITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Upper bound for any configured maximum.
pub const MAX_VALIDITY_CEILING: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Turns the submitter's validity string into a TTL.
///
/// Missing, unparseable and zero values become [`DEFAULT_VALIDITY`]. Values
/// above `max` (or [`MAX_VALIDITY_CEILING`]) are clamped to it.
pub fn parse_validity(validity: Option<&str>, max: Duration) -> Duration {
    let parsed = validity
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| match humantime::parse_duration(v) {
            Ok(d) => Some(d),
            Err(e) => {
                debug!("Invalid validity {v:?}, using default: {e}");
                None
            }
        })
        .filter(|d| !d.is_zero());

    match parsed {
        Some(d) => d.min(max).min(MAX_VALIDITY_CEILING),
        None => DEFAULT_VALIDITY,
    }
}

/// Renders a TTL the way submitters write it, e.g. `15m` or `1h 30m`.
pub fn format_validity(ttl: Duration) -> String {
    humantime::format_duration(ttl).to_string()
}
