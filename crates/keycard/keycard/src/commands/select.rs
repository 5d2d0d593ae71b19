//! SELECT and the two shapes of its answer

use std::fmt;

use bytes::Bytes;
use cardlink_apdu_core::{ApduCommand, ApduResponse, Response, command::ExpectedLength};
use iso7816_tlv::ber::{Tag, Tlv};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use super::check_ok;
use crate::constants::{KEYCARD_AID, tags};
use crate::types::{ApplicationInfo, parse_public_key};

/// SELECT by AID: `00 A4 04 00 Lc AID 00`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectCommand {
    aid: Bytes,
}

impl SelectCommand {
    /// Select the application with the given AID
    pub fn with_aid(aid: impl Into<Bytes>) -> Self {
        Self { aid: aid.into() }
    }

    /// Select the default Keycard instance
    pub const fn keycard() -> Self {
        Self {
            aid: Bytes::from_static(KEYCARD_AID),
        }
    }

    /// The AID this command selects
    pub fn aid(&self) -> &[u8] {
        &self.aid
    }
}

impl ApduCommand for SelectCommand {
    type Success = ParsedSelectOk;
    type Error = crate::Error;

    const NAME: &'static str = "SELECT";

    fn class(&self) -> u8 {
        0x00
    }

    fn instruction(&self) -> u8 {
        0xA4
    }

    fn p1(&self) -> u8 {
        0x04
    }

    fn p2(&self) -> u8 {
        0x00
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.aid)
    }

    fn expected_length(&self) -> Option<ExpectedLength> {
        Some(0)
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        check_ok(Self::NAME, &response)?;
        match response.payload() {
            Some(fci) => ParsedSelectOk::try_from(fci.as_ref()),
            None => Err(Self::Error::InvalidData("Empty SELECT response")),
        }
    }
}

/// What SELECT revealed about the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedSelectOk {
    /// Application info template: the card has already been through INIT
    Initialized(ApplicationInfo),
    /// Bare public key: the card is waiting for INIT
    Uninitialized(Option<k256::PublicKey>),
}

impl ParsedSelectOk {
    /// Key the INIT payload must be encrypted to, when the card is uninitialized
    pub const fn init_public_key(&self) -> Option<&k256::PublicKey> {
        match self {
            Self::Uninitialized(key) => key.as_ref(),
            Self::Initialized(_) => None,
        }
    }

    /// Whether the card already went through INIT
    pub const fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized(_))
    }
}

impl fmt::Display for ParsedSelectOk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized(info) => write!(f, "{info}"),
            Self::Uninitialized(maybe_key) => {
                writeln!(f, "Un-initialized State:")?;
                match maybe_key {
                    Some(key) => write!(
                        f,
                        "  Public Key: 0x{}",
                        hex::encode(key.to_encoded_point(false).as_bytes())
                    ),
                    None => write!(f, "  Public Key: None"),
                }
            }
        }
    }
}

impl TryFrom<&[u8]> for ParsedSelectOk {
    type Error = crate::Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let fci = Tlv::from_bytes(value)?;

        let application_info = Tag::try_from(tags::TEMPLATE_APPLICATION_INFO)?;
        let ecc_public_key = Tag::try_from(tags::ECC_PUBLIC_KEY)?;

        if fci.tag() == &application_info {
            Ok(Self::Initialized(ApplicationInfo::try_from(&fci)?))
        } else if fci.tag() == &ecc_public_key {
            Ok(Self::Uninitialized(parse_public_key(&fci)?))
        } else {
            Err(Self::Error::InvalidData("Invalid Tag"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use cardlink_apdu_core::StatusWord;

    #[test]
    fn test_select_encoding() {
        let bytes = SelectCommand::keycard().to_bytes();
        assert_eq!(
            hex::encode_upper(&bytes),
            "00A4040008A00000080400010100"
        );
    }

    #[test]
    fn test_parse_uninitialized() {
        let key = k256::SecretKey::random(&mut rand_v8::thread_rng()).public_key();
        let mut fci = vec![0x80, 0x41];
        fci.extend_from_slice(key.to_encoded_point(false).as_bytes());

        let parsed = SelectCommand::parse_response(Response::success(Some(fci.into()))).unwrap();
        assert_eq!(parsed, ParsedSelectOk::Uninitialized(Some(key)));
        assert_eq!(parsed.init_public_key(), Some(&key));
        assert!(!parsed.is_initialized());
    }

    #[test]
    fn test_parse_uninitialized_without_key() {
        let parsed = ParsedSelectOk::try_from([0x80, 0x00].as_slice()).unwrap();
        assert_eq!(parsed, ParsedSelectOk::Uninitialized(None));
        assert!(parsed.init_public_key().is_none());
    }

    #[test]
    fn test_parse_error_status() {
        let err = SelectCommand::parse_response(Response::error((0x6A, 0x82))).unwrap_err();
        assert_eq!(err.status(), Some(StatusWord::new(0x6A, 0x82)));
    }

    #[test]
    fn test_parse_unknown_tag() {
        assert!(matches!(
            ParsedSelectOk::try_from([0x81, 0x01, 0x00].as_slice()),
            Err(Error::InvalidData(_))
        ));
    }
}
