use std::fmt;

use base64::prelude::*;
use bytes::BufMut;
use rand::TryRngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::AppletVersion;
use crate::commands::InitParams;
use crate::constants::{
    PAIRING_PASSWORD_ENTROPY, PAIRING_TOKEN_LENGTH, PIN_LENGTH, PUK_LENGTH,
};
use crate::crypto::{PairingToken, generate_pairing_token, random_array};
use crate::validation::{
    ValidationResult, validate_duress_pin, validate_pairing_password, validate_pin, validate_puk,
};

/// The secure random source could not be read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Secure random source unavailable: {reason}")]
pub struct EntropyError {
    reason: String,
}

impl EntropyError {
    /// Wrap the failure reported by a random source
    pub fn new(reason: impl fmt::Display) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Credentials provisioned into a card by INIT
///
/// A `Secrets` value is deliberately not `Clone`: it is handed to the caller exactly
/// once and wiped from memory when dropped. `Debug` never prints the values.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secrets {
    pin: String,
    puk: String,
    pairing_password: String,
    duress_pin: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("pin", &"<redacted>")
            .field("puk", &"<redacted>")
            .field("pairing_password", &"<redacted>")
            .field("duress_pin", &self.duress_pin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Secrets {
    /// Creates a new Secrets instance from caller-chosen credentials
    pub fn new(pin: &str, puk: &str, pairing_password: &str) -> ValidationResult<Self> {
        validate_pin(pin)?;
        validate_puk(puk)?;
        validate_pairing_password(pairing_password)?;

        Ok(Self {
            pin: pin.to_string(),
            puk: puk.to_string(),
            pairing_password: pairing_password.to_string(),
            duress_pin: None,
        })
    }

    /// Set a duress PIN (v3.1+ applets)
    pub fn with_duress_pin(mut self, duress_pin: &str) -> ValidationResult<Self> {
        validate_duress_pin(duress_pin)?;
        self.duress_pin = Some(duress_pin.to_string());
        Ok(self)
    }

    /// Returns the PIN string
    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// Returns the PUK string
    pub fn puk(&self) -> &str {
        &self.puk
    }

    /// Returns the pairing password string
    pub fn pairing_password(&self) -> &str {
        &self.pairing_password
    }

    /// Returns the duress PIN if set
    pub fn duress_pin(&self) -> Option<&str> {
        self.duress_pin.as_deref()
    }

    /// Derive the pairing token from the pairing password
    ///
    /// This runs PBKDF2 with 50 000 rounds on every call.
    pub fn pairing_token(&self) -> PairingToken {
        generate_pairing_token(&self.pairing_password)
    }

    /// Encode the INIT plaintext for the given applet version
    ///
    /// Legacy: `PIN | PUK | token`. v3.1 appends max PIN attempts, max PUK attempts
    /// and the duress PIN, which defaults to the first six PUK digits.
    pub fn to_init_payload(&self, params: &InitParams) -> Zeroizing<Vec<u8>> {
        let base = PIN_LENGTH + PUK_LENGTH + PAIRING_TOKEN_LENGTH;
        let capacity = match params.version {
            AppletVersion::Legacy => base,
            AppletVersion::V3_1 => base + 2 + PIN_LENGTH,
        };

        let mut buffer = Zeroizing::new(Vec::with_capacity(capacity));
        buffer.put_slice(self.pin.as_bytes());
        buffer.put_slice(self.puk.as_bytes());
        buffer.put_slice(self.pairing_token().as_slice());

        if params.version == AppletVersion::V3_1 {
            buffer.put_u8(params.max_pin_attempts);
            buffer.put_u8(params.max_puk_attempts);
            match &self.duress_pin {
                Some(duress) => buffer.put_slice(duress.as_bytes()),
                None => buffer.put_slice(&self.puk.as_bytes()[..PIN_LENGTH]),
            }
        }

        debug_assert_eq!(buffer.len(), capacity, "INIT payload length mismatch");
        buffer
    }
}

/// Source of fresh card credentials
pub trait SecretsGenerator: Send {
    /// Produce a new PIN, PUK and pairing password
    fn generate(&mut self) -> Result<Secrets, EntropyError>;
}

/// Generates secrets from a cryptographically secure random source
///
/// Digits are drawn by rejection sampling so every digit is equally likely.
#[derive(Debug)]
pub struct RandomSecrets<R = OsRng> {
    rng: R,
}

impl Default for RandomSecrets {
    fn default() -> Self {
        Self { rng: OsRng }
    }
}

impl<R: TryRngCore> RandomSecrets<R> {
    /// Use the given random source
    pub const fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    fn digits(&mut self, count: usize) -> Result<String, EntropyError> {
        // 250 is the largest multiple of 10 that fits in a byte
        const LIMIT: u8 = 250;

        let mut digits = String::with_capacity(count);
        while digits.len() < count {
            let block = Zeroizing::new(random_array::<16, R>(&mut self.rng)?);
            for byte in block.iter().copied().filter(|b| *b < LIMIT) {
                if digits.len() == count {
                    break;
                }
                digits.push(char::from(b'0' + byte % 10));
            }
        }
        Ok(digits)
    }

    fn pairing_password(&mut self) -> Result<String, EntropyError> {
        let raw = Zeroizing::new(random_array::<PAIRING_PASSWORD_ENTROPY, R>(&mut self.rng)?);
        Ok(BASE64_URL_SAFE_NO_PAD.encode(raw.as_slice()))
    }
}

impl<R: TryRngCore + Send> SecretsGenerator for RandomSecrets<R> {
    fn generate(&mut self) -> Result<Secrets, EntropyError> {
        Ok(Secrets {
            pin: self.digits(PIN_LENGTH)?,
            puk: self.digits(PUK_LENGTH)?,
            pairing_password: self.pairing_password()?,
            duress_pin: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PAIRING_PASSWORD_LENGTH;
    use std::collections::HashSet;

    fn legacy() -> InitParams {
        InitParams::default()
    }

    fn v3_1(max_pin: u8, max_puk: u8) -> InitParams {
        InitParams {
            version: AppletVersion::V3_1,
            max_pin_attempts: max_pin,
            max_puk_attempts: max_puk,
        }
    }

    #[test]
    fn test_secrets_new() {
        let secrets = Secrets::new("123456", "123456789012", "test-pairing-pass").unwrap();
        assert_eq!(secrets.pin(), "123456");
        assert_eq!(secrets.puk(), "123456789012");
        assert_eq!(secrets.pairing_password(), "test-pairing-pass");
        assert!(secrets.duress_pin().is_none());
    }

    #[test]
    fn test_secrets_new_rejects_bad_input() {
        assert!(Secrets::new("12345", "123456789012", "pass").is_err());
        assert!(Secrets::new("123456", "12345678901", "pass").is_err());
        assert!(Secrets::new("123456", "123456789012", "").is_err());
        assert!(
            Secrets::new("123456", "123456789012", "pass")
                .unwrap()
                .with_duress_pin("1234")
                .is_err()
        );
    }

    #[test]
    fn test_debug_redacts() {
        let secrets = Secrets::new("123456", "123456789012", "test-pairing-pass")
            .unwrap()
            .with_duress_pin("654321")
            .unwrap();
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("123456"));
        assert!(!debug.contains("654321"));
        assert!(!debug.contains("test-pairing-pass"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_to_init_payload_legacy() {
        let secrets = Secrets::new("123456", "123456789012", "test-pairing-pass").unwrap();
        let bytes = secrets.to_init_payload(&legacy());

        assert_eq!(bytes.len(), PIN_LENGTH + PUK_LENGTH + PAIRING_TOKEN_LENGTH);
        assert_eq!(&bytes[0..6], b"123456");
        assert_eq!(&bytes[6..18], b"123456789012");
        assert_eq!(&bytes[18..50], secrets.pairing_token().as_slice());
    }

    #[test]
    fn test_to_init_payload_v3_1() {
        let secrets = Secrets::new("123456", "123456789012", "test-pairing-pass")
            .unwrap()
            .with_duress_pin("654321")
            .unwrap();
        let bytes = secrets.to_init_payload(&v3_1(5, 7));

        assert_eq!(bytes.len(), 50 + 2 + PIN_LENGTH);
        assert_eq!(bytes[50], 5);
        assert_eq!(bytes[51], 7);
        assert_eq!(&bytes[52..58], b"654321");
    }

    #[test]
    fn test_to_init_payload_v3_1_default_duress() {
        let secrets = Secrets::new("123456", "987654321098", "test-pairing-pass").unwrap();
        let bytes = secrets.to_init_payload(&v3_1(3, 5));

        // Defaults to the first six PUK digits
        assert_eq!(&bytes[52..58], b"987654");
    }

    #[test]
    fn test_random_secrets_format() {
        let mut generator = RandomSecrets::default();
        let secrets = generator.generate().unwrap();

        assert_eq!(secrets.pin().len(), PIN_LENGTH);
        assert!(secrets.pin().bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(secrets.puk().len(), PUK_LENGTH);
        assert!(secrets.puk().bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(secrets.pairing_password().len(), PAIRING_PASSWORD_LENGTH);
        assert_eq!(
            BASE64_URL_SAFE_NO_PAD
                .decode(secrets.pairing_password())
                .unwrap()
                .len(),
            PAIRING_PASSWORD_ENTROPY
        );
    }

    #[test]
    fn test_pairing_passwords_unique() {
        let mut generator = RandomSecrets::default();
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let secrets = generator.generate().unwrap();
            assert!(seen.insert(secrets.pairing_password().to_string()));
        }
    }

    #[test]
    fn test_digits_skip_biased_bytes() {
        // Bytes >= 250 must be rejected, so only the trailing bytes yield digits
        struct Scripted(Vec<u8>);
        impl rand::RngCore for Scripted {
            fn next_u32(&mut self) -> u32 {
                unimplemented!()
            }
            fn next_u64(&mut self) -> u64 {
                unimplemented!()
            }
            fn fill_bytes(&mut self, dst: &mut [u8]) {
                for b in dst {
                    *b = self.0.remove(0);
                }
            }
        }

        let mut script = vec![255u8; 10];
        script.extend([1, 12, 23, 34, 45, 59]);
        let mut generator = RandomSecrets::with_rng(Scripted(script));
        assert_eq!(generator.digits(PIN_LENGTH).unwrap(), "123459");
    }

    #[test]
    fn test_entropy_failure() {
        struct Broken;
        impl TryRngCore for Broken {
            type Error = std::io::Error;
            fn try_next_u32(&mut self) -> Result<u32, Self::Error> {
                Err(std::io::Error::other("unavailable"))
            }
            fn try_next_u64(&mut self) -> Result<u64, Self::Error> {
                Err(std::io::Error::other("unavailable"))
            }
            fn try_fill_bytes(&mut self, _: &mut [u8]) -> Result<(), Self::Error> {
                Err(std::io::Error::other("unavailable"))
            }
        }

        let err = RandomSecrets::with_rng(Broken).generate().unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }
}
