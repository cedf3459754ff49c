//! Validation of long URLs submitted for shortening.

use url::Url;

/// Longest accepted long URL, in bytes.
pub const MAX_URL_LEN: usize = 1024;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidUrl {
    #[error("URL must not be empty")]
    Empty,

    #[error("URL exceeds {MAX_URL_LEN} characters")]
    TooLong,

    #[error("Invalid URL format: {0}")]
    Malformed(String),

    #[error("Only HTTP and HTTPS URLs can be shortened")]
    UnsupportedScheme,

    #[error("URL has no host")]
    MissingHost,
}

/// Checks that `input` is an absolute http(s) URL with a host and returns
/// its normalized serialization.
///
/// Normalization follows the WHATWG URL rules: surrounding whitespace and
/// embedded tabs or newlines are removed, the scheme and host are lowercased,
/// an empty path becomes `/` and unsafe characters are percent-encoded. The
/// result is always a valid `Location` header value.
pub fn validate_http_url(input: &str) -> Result<String, InvalidUrl> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvalidUrl::Empty);
    }
    if trimmed.len() > MAX_URL_LEN {
        return Err(InvalidUrl::TooLong);
    }

    let url = Url::parse(trimmed).map_err(|e| InvalidUrl::Malformed(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InvalidUrl::UnsupportedScheme);
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(InvalidUrl::MissingHost);
    }

    let normalized = String::from(url);
    if normalized.len() > MAX_URL_LEN {
        return Err(InvalidUrl::TooLong);
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert_eq!(
            validate_http_url("https://example.com/a?b=c").as_deref(),
            Ok("https://example.com/a?b=c")
        );
        assert_eq!(
            validate_http_url("http://example.com/").as_deref(),
            Ok("http://example.com/")
        );
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(
            validate_http_url("  https://example.com/  ").as_deref(),
            Ok("https://example.com/")
        );
    }

    #[test]
    fn test_returns_normalized_form() {
        assert_eq!(
            validate_http_url("HTTPS://Example.COM").as_deref(),
            Ok("https://example.com/")
        );
        assert_eq!(
            validate_http_url("https://example.com/a b").as_deref(),
            Ok("https://example.com/a%20b")
        );
    }

    #[test]
    fn test_strips_embedded_control_characters() {
        let normalized = validate_http_url("https://example.com/a\nb\tc").unwrap();
        assert_eq!(normalized, "https://example.com/abc");
        assert!(axum::http::HeaderValue::from_str(&normalized).is_ok());
    }

    #[test]
    fn test_length_limit_applies_after_encoding() {
        let prefix = "https://example.com/";
        let spaces = " x".repeat((MAX_URL_LEN - prefix.len()) / 2);
        let input = format!("{}{}", prefix, spaces);
        assert!(input.len() <= MAX_URL_LEN);
        assert_eq!(validate_http_url(&input), Err(InvalidUrl::TooLong));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert_eq!(
            validate_http_url("javascript:alert(1)"),
            Err(InvalidUrl::UnsupportedScheme)
        );
        assert_eq!(
            validate_http_url("ftp://example.com/file"),
            Err(InvalidUrl::UnsupportedScheme)
        );
    }

    #[test]
    fn test_rejects_garbage_and_empty() {
        assert!(matches!(
            validate_http_url("not a url"),
            Err(InvalidUrl::Malformed(_))
        ));
        assert_eq!(validate_http_url("   "), Err(InvalidUrl::Empty));
    }

    #[test]
    fn test_length_limit() {
        let prefix = "https://example.com/";
        let ok = format!("{}{}", prefix, "a".repeat(MAX_URL_LEN - prefix.len()));
        let too_long = format!("{}a", ok);

        assert!(validate_http_url(&ok).is_ok());
        assert_eq!(validate_http_url(&too_long), Err(InvalidUrl::TooLong));
    }
}
