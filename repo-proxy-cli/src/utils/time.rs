use crate::error::AppError;
use std::fmt::Write;
use std::time::Duration;

/// Parse a duration with an optional unit (ms, s, m, h); bare numbers are seconds
pub fn parse_duration(time_str: &str) -> Result<Duration, AppError> {
    let time_str = time_str.trim();
    if time_str.is_empty() {
        return Err(AppError::ParseError("Invalid format: empty string".to_string()));
    }

    // Find the split point between numeric part and unit part
    let split_index = time_str
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map_or(time_str.len(), |(i, _)| i);

    let numeric_part = &time_str[..split_index];
    let unit_part = time_str[split_index..].trim().to_lowercase();

    let value = numeric_part
        .parse::<f64>()
        .map_err(|_| AppError::ParseError(format!("Invalid number in '{time_str}'")))?;

    let seconds = match unit_part.as_str() {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        _ => return Err(AppError::ParseError(format!("Invalid unit '{unit_part}'"))),
    };

    Duration::try_from_secs_f64(seconds)
        .map_err(|_| AppError::ParseError(format!("Duration out of range: '{time_str}'")))
}

/// Convert a duration to a human-readable format
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    let mut result = String::with_capacity(10);

    if seconds >= 3600.0 {
        let hours = seconds / 3600.0;
        let _ = write!(result, "{hours:.2}h");
    } else if seconds >= 60.0 {
        let minutes = seconds / 60.0;
        let _ = write!(result, "{minutes:.2}m");
    } else {
        let _ = write!(result, "{seconds:.2}s");
    }

    result
}
