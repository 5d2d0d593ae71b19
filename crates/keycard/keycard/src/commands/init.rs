//! INIT and its payload parameters

use bytes::Bytes;
use cardlink_apdu_core::{ApduCommand, Response, command::ExpectedLength};
use k256::{PublicKey, SecretKey};
use rand::TryRngCore;

use super::check_ok;
use crate::AppletVersion;
use crate::constants::{CLA_GP, DEFAULT_MAX_PIN_ATTEMPTS, DEFAULT_MAX_PUK_ATTEMPTS, INS_INIT};
use crate::crypto::{IV_LENGTH, ephemeral_secret_key, one_shot_encrypt, random_array};
use crate::validation::{ValidationResult, validate_attempts};

/// Applet-dependent parameters of the INIT payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitParams {
    /// Which payload layout to produce
    pub version: AppletVersion,
    /// PIN retry counter (v3.1+ only)
    pub max_pin_attempts: u8,
    /// PUK retry counter (v3.1+ only)
    pub max_puk_attempts: u8,
}

impl Default for InitParams {
    fn default() -> Self {
        Self::legacy()
    }
}

impl InitParams {
    /// Parameters for applets before 3.1
    pub const fn legacy() -> Self {
        Self {
            version: AppletVersion::Legacy,
            max_pin_attempts: DEFAULT_MAX_PIN_ATTEMPTS,
            max_puk_attempts: DEFAULT_MAX_PUK_ATTEMPTS,
        }
    }

    /// Parameters for v3.1+ applets with validated retry counters
    pub fn v3_1(max_pin_attempts: u8, max_puk_attempts: u8) -> ValidationResult<Self> {
        Ok(Self {
            version: AppletVersion::V3_1,
            max_pin_attempts: validate_attempts("PIN attempts", max_pin_attempts)?,
            max_puk_attempts: validate_attempts("PUK attempts", max_puk_attempts)?,
        })
    }
}

/// INIT: `80 FE 00 00 Lc data 00`
///
/// The data is the INIT payload encrypted to the card's public key, so a
/// constructed command carries no plaintext secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitCommand {
    data: Bytes,
}

impl InitCommand {
    /// Encrypt `payload` to the card using an ephemeral host key and random IV
    pub fn with_card_pubkey<R: TryRngCore>(
        card_public_key: &PublicKey,
        payload: &[u8],
        rng: &mut R,
    ) -> crate::Result<Self> {
        let host_private_key = ephemeral_secret_key(rng)?;
        let iv = random_array::<IV_LENGTH, R>(rng)?;
        Self::with_host_key(card_public_key, &host_private_key, &iv, payload)
    }

    /// Encrypt `payload` with an explicit host key and IV
    pub fn with_host_key(
        card_public_key: &PublicKey,
        host_private_key: &SecretKey,
        iv: &[u8; IV_LENGTH],
        payload: &[u8],
    ) -> crate::Result<Self> {
        let data = one_shot_encrypt(card_public_key, host_private_key, iv, payload)?;
        Ok(Self { data })
    }
}

impl ApduCommand for InitCommand {
    type Success = ();
    type Error = crate::Error;

    const NAME: &'static str = "INIT";

    fn class(&self) -> u8 {
        CLA_GP
    }

    fn instruction(&self) -> u8 {
        INS_INIT
    }

    fn p1(&self) -> u8 {
        0x00
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(0)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        check_ok(Self::NAME, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::one_shot_decrypt;
    use rand::rngs::OsRng;

    #[test]
    fn test_init_encoding() {
        let card = SecretKey::random(&mut rand_v8::thread_rng());
        let host = SecretKey::random(&mut rand_v8::thread_rng());
        let payload = [0x31u8; 50];

        let cmd = InitCommand::with_host_key(&card.public_key(), &host, &[7u8; 16], &payload)
            .unwrap();
        let bytes = cmd.to_bytes();

        // 1 + 65 + 16 + 64 bytes of data
        assert_eq!(&bytes[..5], &[0x80, 0xFE, 0x00, 0x00, 146]);
        assert_eq!(bytes.len(), 5 + 146 + 1);
        assert_eq!(bytes[bytes.len() - 1], 0x00);

        let decrypted = one_shot_decrypt(&card, &bytes[5..5 + 146]).unwrap();
        assert_eq!(decrypted.as_slice(), &payload);
    }

    #[test]
    fn test_init_random_host_key() {
        let card = SecretKey::random(&mut rand_v8::thread_rng());
        let a = InitCommand::with_card_pubkey(&card.public_key(), b"123456", &mut OsRng).unwrap();
        let b = InitCommand::with_card_pubkey(&card.public_key(), b"123456", &mut OsRng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_init_params() {
        assert_eq!(InitParams::default().version, AppletVersion::Legacy);
        let params = InitParams::v3_1(5, 7).unwrap();
        assert_eq!(params.max_pin_attempts, 5);
        assert_eq!(params.max_puk_attempts, 7);
        assert!(InitParams::v3_1(0, 5).is_err());
    }

    #[test]
    fn test_parse_response() {
        assert!(InitCommand::parse_response(Response::success(None)).is_ok());
        assert!(matches!(
            InitCommand::parse_response(Response::error((0x6D, 0x00))),
            Err(crate::Error::CardProtocol { command: "INIT", .. })
        ));
    }
}
