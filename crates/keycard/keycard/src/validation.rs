//! Input validation utilities for Keycard credentials
//!
//! Caller-supplied PINs, PUKs and pairing passwords go through these checks before
//! they can end up in an INIT payload.

use crate::constants::{AID_MAX_LENGTH, AID_MIN_LENGTH, PIN_LENGTH, PUK_LENGTH};

/// Error type for input validation failures
///
/// Variants never carry the rejected value, only its shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The input was not the expected length
    #[error("{field} has incorrect length: expected {expected}, got {actual}")]
    IncorrectLength {
        /// Which credential was rejected
        field: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// The input contained invalid characters
    #[error("{field} contains invalid characters")]
    InvalidCharacters {
        /// Which credential was rejected
        field: &'static str,
    },

    /// The input was out of the allowed range
    #[error("{field} is out of allowed range: value {value}, min {min}, max {max}")]
    OutOfRange {
        /// Which setting was rejected
        field: &'static str,
        /// The value that was out of range
        value: usize,
        /// Minimum allowed value
        min: usize,
        /// Maximum allowed value
        max: usize,
    },

    /// The input was empty
    #[error("{field} must not be empty")]
    Empty {
        /// Which credential was rejected
        field: &'static str,
    },
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

fn validate_digits(field: &'static str, value: &str, expected: usize) -> ValidationResult<()> {
    if value.len() != expected {
        return Err(ValidationError::IncorrectLength {
            field,
            expected,
            actual: value.len(),
        });
    }

    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidCharacters { field });
    }

    Ok(())
}

/// Validates a PIN: exactly 6 ASCII digits
pub(crate) fn validate_pin(pin: &str) -> ValidationResult<()> {
    validate_digits("PIN", pin, PIN_LENGTH)
}

/// Validates a duress PIN: same shape as a PIN
pub(crate) fn validate_duress_pin(pin: &str) -> ValidationResult<()> {
    validate_digits("Duress PIN", pin, PIN_LENGTH)
}

/// Validates a PUK: exactly 12 ASCII digits
pub(crate) fn validate_puk(puk: &str) -> ValidationResult<()> {
    validate_digits("PUK", puk, PUK_LENGTH)
}

/// Validates a pairing password
///
/// Any non-empty password is accepted; generated passwords are always 16 characters.
pub(crate) fn validate_pairing_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Empty {
            field: "Pairing password",
        });
    }
    Ok(())
}

/// Validates a retry counter configured at INIT
pub(crate) fn validate_attempts(field: &'static str, attempts: u8) -> ValidationResult<u8> {
    const MIN: u8 = 1;
    const MAX: u8 = 10;

    if !(MIN..=MAX).contains(&attempts) {
        return Err(ValidationError::OutOfRange {
            field,
            value: attempts as usize,
            min: MIN as usize,
            max: MAX as usize,
        });
    }

    Ok(attempts)
}

/// Validates an applet AID before it goes into a SELECT
pub(crate) fn validate_aid(aid: &[u8]) -> ValidationResult<()> {
    if !(AID_MIN_LENGTH..=AID_MAX_LENGTH).contains(&aid.len()) {
        return Err(ValidationError::OutOfRange {
            field: "AID length",
            value: aid.len(),
            min: AID_MIN_LENGTH,
            max: AID_MAX_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("123456").is_ok());
        assert_eq!(
            validate_pin("12345"),
            Err(ValidationError::IncorrectLength {
                field: "PIN",
                expected: 6,
                actual: 5
            })
        );
        assert_eq!(
            validate_pin("12a456"),
            Err(ValidationError::InvalidCharacters { field: "PIN" })
        );
        // Non-ASCII digits are rejected even when they are numeric
        assert!(validate_pin("١٢٣٤٥٦").is_err());
    }

    #[test]
    fn test_validate_puk() {
        assert!(validate_puk("123456789012").is_ok());
        assert!(validate_puk("12345678901").is_err());
        assert!(validate_puk("12345678901x").is_err());
    }

    #[test]
    fn test_validate_pairing_password() {
        assert!(validate_pairing_password("KeycardTest").is_ok());
        assert_eq!(
            validate_pairing_password(""),
            Err(ValidationError::Empty {
                field: "Pairing password"
            })
        );
    }

    #[test]
    fn test_validate_attempts() {
        assert_eq!(validate_attempts("PIN attempts", 3), Ok(3));
        assert!(validate_attempts("PIN attempts", 0).is_err());
        assert!(validate_attempts("PUK attempts", 11).is_err());
    }

    #[test]
    fn test_validate_aid() {
        assert!(validate_aid(crate::KEYCARD_AID).is_ok());
        assert!(validate_aid(&[0xA0; 5]).is_ok());
        assert!(validate_aid(&[0xA0; 4]).is_err());
        assert_eq!(
            validate_aid(&[0xA0; 300]),
            Err(ValidationError::OutOfRange {
                field: "AID length",
                value: 300,
                min: 5,
                max: 16
            })
        );
    }

    #[test]
    fn test_error_does_not_echo_input() {
        let err = validate_pin("98765x").unwrap_err();
        assert!(!err.to_string().contains("98765"));
    }
}
