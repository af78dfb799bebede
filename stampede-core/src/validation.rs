//! Load test input validation
//!
//! Each check returns the first violation it finds; callers get exactly one
//! [`ValidationError`] per rejected input.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::ValidationError;
use crate::load_test::LoadTestConfig;
use crate::types::HttpMethod;

pub const MIN_CONCURRENT_USERS: usize = 1;
pub const MAX_CONCURRENT_USERS: usize = 1000;
pub const MIN_TEST_ID_LENGTH: usize = 3;
pub const MAX_TEST_ID_LENGTH: usize = 100;

static TEST_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("test id pattern is valid"));

/// Validate a load test configuration before it is accepted
pub fn validate_config(config: &LoadTestConfig) -> Result<(), ValidationError> {
    validate_url(&config.url)?;

    if !(MIN_CONCURRENT_USERS..=MAX_CONCURRENT_USERS).contains(&config.concurrent_users) {
        return Err(ValidationError::new(
            "concurrent_users",
            config.concurrent_users,
            "range",
            format!(
                "concurrent_users must be between {} and {}",
                MIN_CONCURRENT_USERS, MAX_CONCURRENT_USERS
            ),
        ));
    }

    // Durations are unsigned, so the non-negative rule for duration and
    // request_delay holds by construction.

    if !config.method.trim().is_empty() && config.method.trim().parse::<HttpMethod>().is_err() {
        return Err(ValidationError::new(
            "method",
            &config.method,
            "oneof",
            "method must be one of GET, POST, PUT, DELETE, PATCH",
        ));
    }

    // Sorted so the reported violation does not depend on map iteration order
    let mut headers: Vec<(&String, &String)> = config.headers.iter().collect();
    headers.sort();
    for (name, value) in headers {
        if contains_line_break(name) {
            return Err(ValidationError::new(
                "headers",
                name,
                "no_crlf",
                format!("header name {:?} must not contain CR or LF", name),
            ));
        }
        if contains_line_break(value) {
            return Err(ValidationError::new(
                "headers",
                value,
                "no_crlf",
                format!("value of header {:?} must not contain CR or LF", name),
            ));
        }
    }

    Ok(())
}

/// Validate a caller-supplied test ID
pub fn validate_test_id(test_id: &str) -> Result<(), ValidationError> {
    if test_id.is_empty() {
        return Err(ValidationError::new(
            "test_id",
            test_id,
            "required",
            "test_id is required",
        ));
    }

    let length = test_id.chars().count();
    if !(MIN_TEST_ID_LENGTH..=MAX_TEST_ID_LENGTH).contains(&length) {
        return Err(ValidationError::new(
            "test_id",
            test_id,
            "length",
            format!(
                "test_id must be between {} and {} characters",
                MIN_TEST_ID_LENGTH, MAX_TEST_ID_LENGTH
            ),
        ));
    }

    if !TEST_ID_PATTERN.is_match(test_id) {
        return Err(ValidationError::new(
            "test_id",
            test_id,
            "charset",
            "test_id may only contain letters, digits, '_' and '-'",
        ));
    }

    Ok(())
}

fn validate_url(raw: &str) -> Result<(), ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::new("url", raw, "required", "url is required"));
    }

    let parsed = Url::parse(raw).map_err(|e| {
        ValidationError::new("url", raw, "url", format!("url is not a valid URL: {}", e))
    })?;

    if parsed.scheme().is_empty() || parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::new(
            "url",
            raw,
            "url",
            "url must include a scheme and a host",
        ));
    }

    Ok(())
}

fn contains_line_break(s: &str) -> bool {
    s.contains('\r') || s.contains('\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn valid_config() -> LoadTestConfig {
        LoadTestConfig::new("http://localhost:8080/api", 10)
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
        assert!(validate_config(&valid_config().with_method("patch")).is_ok());
        assert!(validate_config(&valid_config().with_method("")).is_ok());
        assert!(validate_config(&valid_config().with_duration(Duration::ZERO)).is_ok());
    }

    #[test]
    fn test_url_rules() {
        let mut config = valid_config();
        config.url = String::new();
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.field, "url");
        assert_eq!(err.rule, "required");

        config.url = "not a url".to_string();
        assert_eq!(validate_config(&config).unwrap_err().rule, "url");

        config.url = "mailto:someone@example.com".to_string();
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.field, "url");
        assert_eq!(err.message, "url must include a scheme and a host");
    }

    #[test]
    fn test_user_bounds() {
        let mut config = valid_config();
        config.concurrent_users = 0;
        assert_eq!(validate_config(&config).unwrap_err().field, "concurrent_users");

        config.concurrent_users = 1001;
        assert_eq!(validate_config(&config).unwrap_err().value, "1001");

        config.concurrent_users = 1000;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_method_rule() {
        let err = validate_config(&valid_config().with_method("HEAD")).unwrap_err();
        assert_eq!(err.field, "method");
        assert_eq!(err.rule, "oneof");
    }

    #[test]
    fn test_header_injection_guard() {
        let err = validate_config(&valid_config().with_header("X-Test", "a\r\nInjected: yes")).unwrap_err();
        assert_eq!(err.field, "headers");
        assert_eq!(err.rule, "no_crlf");

        let err = validate_config(&valid_config().with_header("X-Bad\n", "value")).unwrap_err();
        assert_eq!(err.rule, "no_crlf");
    }

    #[test]
    fn test_first_violation_wins() {
        let mut config = valid_config().with_method("TRACE");
        config.url = String::new();
        config.concurrent_users = 0;
        assert_eq!(validate_config(&config).unwrap_err().field, "url");
    }

    #[test]
    fn test_test_id_rules() {
        assert!(validate_test_id("abc").is_ok());
        assert!(validate_test_id("load_test-2024").is_ok());
        assert!(validate_test_id(&"a".repeat(100)).is_ok());

        assert_eq!(validate_test_id("").unwrap_err().rule, "required");
        assert_eq!(validate_test_id("ab").unwrap_err().rule, "length");
        assert_eq!(validate_test_id(&"a".repeat(101)).unwrap_err().rule, "length");
        assert_eq!(validate_test_id("has space").unwrap_err().rule, "charset");
        assert_eq!(validate_test_id("semi;colon").unwrap_err().rule, "charset");
    }

    #[test]
    fn test_generated_ids_validate() {
        assert!(validate_test_id(&crate::load_test::generate_test_id()).is_ok());
    }
}
