//! Field validation shared by every write path.
//!
//! The backend's tables carry almost no constraints, so these checks are the
//! only thing standing between a form submit and a malformed row.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub const MAX_TITLE_LEN: usize = 200;
/// One week, in minutes.
pub const MAX_REMINDER_MINUTES: i32 = 7 * 24 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("Event end must not be before its start")]
    EndBeforeStart,

    #[error("Reminder time must be between 0 and 10080 minutes, got {0}")]
    InvalidReminder(i32),

    #[error("{0} must be a port between 1 and 65535")]
    InvalidPort(&'static str),

    #[error("{0}")]
    Invalid(String),
}

/// Trim a required text field and enforce its length limit.
///
/// # Examples
/// ```
/// use db::validation::validate_title;
///
/// assert_eq!(validate_title("title", "  Plan sprint ").unwrap(), "Plan sprint");
/// assert!(validate_title("title", "   ").is_err());
/// ```
pub fn validate_title(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_TITLE_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Normalise optional free text: blank strings become `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// # Examples
/// ```
/// use db::validation::validate_email_address;
///
/// assert!(validate_email_address("ada@example.com").is_ok());
/// assert!(validate_email_address("ada@").is_err());
/// ```
pub fn validate_email_address(address: &str) -> Result<String, ValidationError> {
    let trimmed = address.trim();
    let invalid = || ValidationError::InvalidEmail(trimmed.to_string());

    let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || trimmed.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

pub fn validate_time_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if end < start {
        Err(ValidationError::EndBeforeStart)
    } else {
        Ok(())
    }
}

/// A reminder offset only matters for reminder events; other events drop it.
pub fn validate_reminder(
    is_reminder: bool,
    minutes: Option<i32>,
) -> Result<Option<i32>, ValidationError> {
    if !is_reminder {
        return Ok(None);
    }
    match minutes {
        Some(m) if !(0..=MAX_REMINDER_MINUTES).contains(&m) => {
            Err(ValidationError::InvalidReminder(m))
        }
        Some(m) => Ok(Some(m)),
        None => Ok(Some(0)),
    }
}

pub fn validate_port(field: &'static str, port: i32) -> Result<i32, ValidationError> {
    if (1..=65535).contains(&port) {
        Ok(port)
    } else {
        Err(ValidationError::InvalidPort(field))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_validate_title_trims_and_limits() {
        assert_eq!(validate_title("name", " Home ").unwrap(), "Home");
        assert_eq!(
            validate_title("name", ""),
            Err(ValidationError::Empty("name"))
        );
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        assert_eq!(
            validate_title("name", &long),
            Err(ValidationError::TooLong {
                field: "name",
                max: MAX_TITLE_LEN
            })
        );
        assert!(validate_title("name", &"é".repeat(MAX_TITLE_LEN)).is_ok());
    }

    #[test]
    fn test_validate_email_address() {
        assert_eq!(
            validate_email_address(" ada@example.com ").unwrap(),
            "ada@example.com"
        );
        assert!(validate_email_address("no-at-sign").is_err());
        assert!(validate_email_address("@example.com").is_err());
        assert!(validate_email_address("a@b@c").is_err());
        assert!(validate_email_address("a b@example.com").is_err());
    }

    #[test]
    fn test_validate_time_range() {
        let start = Utc::now();
        assert!(validate_time_range(start, start).is_ok());
        assert!(validate_time_range(start, start + Duration::hours(1)).is_ok());
        assert_eq!(
            validate_time_range(start, start - Duration::minutes(1)),
            Err(ValidationError::EndBeforeStart)
        );
    }

    #[test]
    fn test_validate_reminder() {
        assert_eq!(validate_reminder(false, Some(30)), Ok(None));
        assert_eq!(validate_reminder(true, None), Ok(Some(0)));
        assert_eq!(validate_reminder(true, Some(15)), Ok(Some(15)));
        assert_eq!(
            validate_reminder(true, Some(-5)),
            Err(ValidationError::InvalidReminder(-5))
        );
        assert!(validate_reminder(true, Some(MAX_REMINDER_MINUTES + 1)).is_err());
    }

    #[test]
    fn test_validate_port() {
        assert_eq!(validate_port("imap_port", 993), Ok(993));
        assert!(validate_port("imap_port", 0).is_err());
        assert!(validate_port("imap_port", 70000).is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  ".into())), None);
        assert_eq!(normalize_optional(Some(" note ".into())), Some("note".into()));
        assert_eq!(normalize_optional(None), None);
    }
}
