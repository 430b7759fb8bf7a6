//! Syntactic validation of scan targets.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static IPV4_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,3}\.){3}[0-9]{1,3}$").expect("valid IPv4 pattern"));

static DOMAIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$",
    )
    .expect("valid domain pattern")
});

/// Reasons a scan target is rejected before any scan starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Target cannot be empty")]
    Empty,
    #[error("Invalid IPv4 address. Each octet must be 0-255.")]
    OctetOutOfRange,
    #[error("Invalid target. Enter a valid IP address or domain name.")]
    Malformed,
}

/// Wire shape of a validation outcome: `{valid, error?}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<(), ValidationError>> for Validation {
    fn from(res: Result<(), ValidationError>) -> Self {
        match res {
            Ok(()) => Validation {
                valid: true,
                error: None,
            },
            Err(e) => Validation {
                valid: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Syntactic check of an IPv4 address or domain name. No resolution is attempted.
pub fn validate(target: &str) -> Result<(), ValidationError> {
    if target.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    if IPV4_SHAPE.is_match(target) {
        // 1-3 ASCII digits per octet.
        let in_range = target
            .split('.')
            .all(|o| o.parse::<u16>().map(|v| v <= 255).unwrap_or(false));
        if !in_range {
            return Err(ValidationError::OctetOutOfRange);
        }
        return Ok(());
    }

    if DOMAIN_NAME.is_match(target) || target == "localhost" {
        return Ok(());
    }

    Err(ValidationError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ipv4_and_names() {
        assert_eq!(validate("192.168.1.1"), Ok(()));
        assert_eq!(validate("0.0.0.0"), Ok(()));
        assert_eq!(validate("example.com"), Ok(()));
        assert_eq!(validate("localhost"), Ok(()));
        assert_eq!(validate("my-host.internal.example"), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_octets() {
        assert_eq!(validate("256.1.1.1"), Err(ValidationError::OctetOutOfRange));
        assert_eq!(
            validate("999.999.999.999"),
            Err(ValidationError::OctetOutOfRange)
        );
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(validate(""), Err(ValidationError::Empty));
        assert_eq!(validate("   "), Err(ValidationError::Empty));
        assert_eq!(validate("not a valid host!!"), Err(ValidationError::Malformed));
        assert_eq!(validate("-leading.example"), Err(ValidationError::Malformed));
        assert_eq!(validate("trailing-.example"), Err(ValidationError::Malformed));
    }

    #[test]
    fn non_ascii_digits_are_malformed() {
        assert_eq!(
            validate("\u{661}.\u{661}.\u{661}.\u{661}"),
            Err(ValidationError::Malformed)
        );
        assert_eq!(validate("1.1.1.\u{0663}"), Err(ValidationError::Malformed));
    }

    #[test]
    fn label_length_limit() {
        let ok = "a".repeat(63);
        let too_long = "a".repeat(64);
        assert_eq!(validate(&format!("{ok}.com")), Ok(()));
        assert_eq!(
            validate(&format!("{too_long}.com")),
            Err(ValidationError::Malformed)
        );
    }

    #[test]
    fn error_messages_are_user_facing() {
        let v: Validation = validate("256.1.1.1").into();
        assert!(!v.valid);
        assert_eq!(
            v.error.as_deref(),
            Some("Invalid IPv4 address. Each octet must be 0-255.")
        );
    }
}
