mod application_info;
mod capabilities;
mod version;

pub use application_info::ApplicationInfo;
pub use capabilities::{Capabilities, Capability};
pub use version::Version;

use iso7816_tlv::ber::{Tag, Tlv, Value};

use crate::{Error, constants::tags};

pub(crate) fn get_primitive_value(tag: &Tag, tlv: &Tlv) -> Result<Vec<u8>, Error> {
    if tag != tlv.tag() {
        return Err(Error::InvalidData("Invalid tag"));
    }
    match tlv.value() {
        Value::Primitive(bytes) => Ok(bytes.to_vec()),
        _ => Err(Error::InvalidData("Invalid value type")),
    }
}

/// Parse a tag `80` public key: 65 bytes uncompressed, or empty when the card has none
pub(crate) fn parse_public_key(tlv: &Tlv) -> Result<Option<k256::PublicKey>, Error> {
    let value = get_primitive_value(&Tag::try_from(tags::ECC_PUBLIC_KEY)?, tlv)?;
    match value.len() {
        0 => Ok(None),
        65 => Ok(Some(k256::PublicKey::from_sec1_bytes(&value)?)),
        _ => Err(Error::InvalidData("Invalid public key length")),
    }
}
