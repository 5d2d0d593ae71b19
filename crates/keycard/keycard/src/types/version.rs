use derive_more::Display;
use iso7816_tlv::ber::{Tag, Tlv};

use super::get_primitive_value;
use crate::constants::tags;

/// Application version (major.minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[display("{major}.{minor}")]
pub struct Version {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
}

impl Version {
    /// Create a version
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Whether the applet understands the v3.1 INIT payload
    pub const fn supports_v3_1_init(&self) -> bool {
        self.major > 3 || (self.major == 3 && self.minor >= 1)
    }
}

impl TryFrom<&Tlv> for Version {
    type Error = crate::Error;

    fn try_from(tlv: &Tlv) -> Result<Self, Self::Error> {
        match get_primitive_value(&Tag::try_from(tags::OTHER)?, tlv)?.as_slice() {
            [major, minor] => Ok(Self::new(*major, *minor)),
            _ => Err(Self::Error::InvalidData("Invalid version length")),
        }
    }
}
