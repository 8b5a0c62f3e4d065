use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::error::AppError;

/// Parse one "Name: Value" header
fn parse_header(header_str: &str) -> Result<(HeaderName, HeaderValue), AppError> {
    let Some((name, value)) = header_str.split_once(':') else {
        return Err(AppError::InvalidInput(format!(
            "Invalid header format: '{header_str}'. Expected 'Name: Value'"
        )));
    };
    let (name, value) = (name.trim(), value.trim());

    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| AppError::InvalidInput(format!("Invalid header name: '{name}'")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| AppError::InvalidInput(format!("Invalid value for header '{name}'")))?;

    Ok((header_name, header_value))
}

/// Parse a collection of header strings into a HeaderMap; later duplicates win
pub fn parse_headers(header_strings: &[String]) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();

    for header_str in header_strings {
        let (name, value) = parse_header(header_str)?;
        debug!(header = %name, "Adding upstream header");
        headers.insert(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_trims() {
        let headers = parse_headers(&[
            "Authorization: Bearer token".to_string(),
            "X-Trace:  a:b ".to_string(),
        ])
        .unwrap();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers["authorization"], "Bearer token");
        assert_eq!(headers["x-trace"], "a:b");
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(matches!(
            parse_headers(&["no colon here".to_string()]),
            Err(AppError::InvalidInput(_))
        ));
        assert!(parse_headers(&["bad name: x".to_string()]).is_err());
    }
}
