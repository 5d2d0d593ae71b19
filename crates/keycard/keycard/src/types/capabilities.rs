use std::fmt;

use iso7816_tlv::ber::{Tlv, Value};

/// Capability flags for the keycard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Secure channel with pairing
    SecureChannel = 0x01,
    /// Key generation, loading and export
    KeyManagement = 0x02,
    /// PIN, PUK and pairing secret management
    CredentialsManagement = 0x04,
    /// NDEF record storage
    Ndef = 0x08,
}

/// Capabilities flags container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(u8);

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Capability::SecureChannel, "Secure Channel"),
            (Capability::KeyManagement, "Key Management"),
            (Capability::CredentialsManagement, "Credentials Management"),
            (Capability::Ndef, "NDEF"),
        ]
        .into_iter()
        .filter(|(capability, _)| self.has_capability(*capability))
        .map(|(_, name)| name)
        .collect();
        write!(f, "{}", names.join(", "))
    }
}

impl Capabilities {
    /// Combine individual capability flags
    pub fn new(capabilities: &[Capability]) -> Self {
        Self(capabilities.iter().fold(0, |flags, &cap| flags | cap as u8))
    }

    /// Whether `capability` is set
    pub const fn has_capability(&self, capability: Capability) -> bool {
        self.0 & capability as u8 != 0
    }
}

impl TryFrom<&Tlv> for Capabilities {
    type Error = crate::Error;

    fn try_from(tlv: &Tlv) -> Result<Self, Self::Error> {
        match tlv.value() {
            Value::Primitive(data) => data
                .first()
                .map(|flags| Self(*flags))
                .ok_or(Self::Error::InvalidData("Empty capabilities")),
            _ => Err(Self::Error::InvalidData("Invalid TLV for Capabilities")),
        }
    }
}

impl From<u8> for Capabilities {
    fn from(value: u8) -> Self {
        Self(value)
    }
}
