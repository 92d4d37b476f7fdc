//! Timestamp parsing for oracle responses.
//!
//! Accepts `HH:MM:SS(.mmm)`, `MM:SS(.mmm)` and plain `SS(.mmm)`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,

    #[error("invalid {0} component: '{1}'")]
    InvalidValue(&'static str, String),

    #[error("negative timestamp component")]
    Negative,

    #[error("invalid timestamp format: '{0}'")]
    InvalidFormat(String),
}

/// Parse a timestamp string to total seconds.
///
/// # Examples
/// ```
/// use vscene_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let names: &[&'static str] = match parts.len() {
        1 => &["seconds"],
        2 => &["minutes", "seconds"],
        3 => &["hours", "minutes", "seconds"],
        _ => return Err(TimestampError::InvalidFormat(ts.to_string())),
    };

    let mut total = 0.0;
    for (part, name) in parts.iter().zip(names) {
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| TimestampError::InvalidValue(*name, part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total = total * 60.0 + value;
    }
    Ok(total)
}
