use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::serde::json::{self, Json};
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

pub static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// JSON request body as received by a route; parse failures are kept so the
/// handler can answer with the standard envelope instead of a bare catcher.
pub type JsonBody<'r, T> = Result<Json<T>, json::Error<'r>>;

pub trait JsonValidateExt<T> {
    /// Unwraps a request body and runs its `validator` rules.
    fn validated(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for JsonBody<'_, T> {
    fn validated(self) -> Result<T, AppError> {
        let body = self.map_err(describe_json_error)?.into_inner();
        body.validate().map_err(describe_validation_errors)?;
        Ok(body)
    }
}

fn describe_json_error(err: json::Error<'_>) -> AppError {
    match err {
        json::Error::Io(e) => AppError::Validation(format!("Could not read request body: {}", e)),
        json::Error::Parse(_, e) => AppError::Validation(format!("Invalid request body: {}", e)),
    }
}

pub fn describe_validation_errors(errors: ValidationErrors) -> AppError {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, field_errors)| {
            let reason = field_errors
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "is invalid".to_string());
            format!("{}: {}", field, reason)
        })
        .collect();
    parts.sort();

    if parts.is_empty() {
        AppError::Validation("Invalid request".to_string())
    } else {
        AppError::Validation(parts.join("; "))
    }
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{} must be a date (YYYY-MM-DD)", field)))
}

/// Accepts RFC 3339 timestamps or naive `YYYY-MM-DDTHH:MM[:SS]` values, which
/// are taken as UTC. Sub-second precision is dropped.
pub fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, AppError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc).naive_utc().trunc_subsecs(0));
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.trunc_subsecs(0))
        .ok_or_else(|| AppError::Validation(format!("{} must be an ISO 8601 date-time", field)))
}

pub fn parse_optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    value.map(|v| parse_date(field, v)).transpose()
}

pub fn require_email(value: &str) -> Result<String, AppError> {
    let email = value.trim().to_lowercase();
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(AppError::Validation("email: must be a valid email address".to_string()))
    }
}

pub fn non_blank(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern() {
        assert!(EMAIL_RE.is_match("coach@example.com"));
        assert!(!EMAIL_RE.is_match("coach@example"));
        assert!(!EMAIL_RE.is_match("coach example@x.io"));
        assert!(!EMAIL_RE.is_match("@example.com"));
        assert_eq!(require_email(" Coach@Example.com ").unwrap(), "coach@example.com");
        assert!(require_email("not-an-email").is_err());
    }

    #[test]
    fn datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        assert_eq!(parse_datetime("at", "2025-03-10T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("at", "2025-03-10T12:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_datetime("at", "2025-03-10T10:00").unwrap(), expected);
        assert_eq!(parse_datetime("at", "2025-03-10 10:00:00").unwrap(), expected);
        assert!(matches!(
            parse_datetime("at", "tomorrow"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn date_format() {
        assert!(parse_date("date", "2025-02-30").is_err());
        assert_eq!(
            parse_optional_date("date", Some("2025-02-28")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(parse_optional_date("date", None).unwrap(), None);
    }
}
