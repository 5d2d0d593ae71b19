use std::fmt;

use iso7816_tlv::ber::{Tag, Tlv, Value};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use super::{Capabilities, Version, get_primitive_value, parse_public_key};
use crate::constants::tags;

/// Application info returned by SELECT on an initialized card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Instance UID (16 bytes)
    pub instance_uid: [u8; 16],
    /// ECC public key (65 bytes or empty)
    pub public_key: Option<k256::PublicKey>,
    /// Application version
    pub version: Version,
    /// Number of remaining pairing slots
    pub remaining_slots: u8,
    /// Key UID (32 bytes SHA-256 hash of master public key or empty)
    pub key_uid: Option<[u8; 32]>,
    /// Supported capabilities
    pub capabilities: Capabilities,
}

impl TryFrom<&Tlv> for ApplicationInfo {
    type Error = crate::Error;

    fn try_from(tlv: &Tlv) -> Result<Self, Self::Error> {
        if tlv.tag() != &Tag::try_from(tags::TEMPLATE_APPLICATION_INFO)? {
            return Err(Self::Error::InvalidData(
                "TLV tag was not application info template tag",
            ));
        }

        let Value::Constructed(children) = tlv.value() else {
            return Err(Self::Error::InvalidData("TLV value was not constructed"));
        };

        let instance_uid_tag = Tag::try_from(tags::INSTANCE_UID)?;
        let public_key_tag = Tag::try_from(tags::ECC_PUBLIC_KEY)?;
        let other_tag = Tag::try_from(tags::OTHER)?;
        let key_uid_tag = Tag::try_from(tags::KEY_UID)?;
        let capabilities_tag = Tag::try_from(tags::CAPABILITIES)?;

        let mut instance_uid = None;
        let mut public_key = None;
        let mut version = None;
        let mut remaining_slots = None;
        let mut key_uid = None;
        // Cards older than 2.x omit the capabilities byte and support everything.
        let mut capabilities = Capabilities::from(0xFF);

        for child in children {
            let tag = child.tag();
            if tag == &instance_uid_tag {
                let raw = get_primitive_value(&instance_uid_tag, child)?;
                instance_uid = Some(
                    <[u8; 16]>::try_from(raw.as_slice())
                        .map_err(|_| Self::Error::InvalidData("Invalid instance UID length"))?,
                );
            } else if tag == &public_key_tag {
                public_key = parse_public_key(child)?;
            } else if tag == &other_tag {
                // The first `02` is the version, the second the pairing slot count
                if version.is_none() {
                    version = Some(Version::try_from(child)?);
                } else {
                    let raw = get_primitive_value(&other_tag, child)?;
                    remaining_slots = Some(
                        *raw.first()
                            .ok_or(Self::Error::InvalidData("Empty pairing slot count"))?,
                    );
                }
            } else if tag == &key_uid_tag {
                let raw = get_primitive_value(&key_uid_tag, child)?;
                key_uid = match raw.len() {
                    0 => None,
                    32 => Some(
                        <[u8; 32]>::try_from(raw.as_slice())
                            .map_err(|_| Self::Error::InvalidData("Invalid key UID length"))?,
                    ),
                    _ => return Err(Self::Error::InvalidData("Invalid key UID length")),
                };
            } else if tag == &capabilities_tag {
                capabilities = Capabilities::try_from(child)?;
            }
        }

        Ok(Self {
            instance_uid: instance_uid.ok_or(Self::Error::InvalidData("Missing instance UID"))?,
            public_key,
            version: version.ok_or(Self::Error::InvalidData("Missing application version"))?,
            remaining_slots: remaining_slots
                .ok_or(Self::Error::InvalidData("Missing pairing slot count"))?,
            key_uid,
            capabilities,
        })
    }
}

impl fmt::Display for ApplicationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Application Info:")?;
        writeln!(f, "  Instance UID: {}", hex::encode(self.instance_uid))?;

        writeln!(f, "  Version: {}", self.version)?;
        writeln!(f, "  Remaining pairing slots: {}", self.remaining_slots)?;

        if let Some(ref key_uid) = self.key_uid {
            writeln!(f, "  Key UID: 0x{}", hex::encode(key_uid))?;
        } else {
            writeln!(f, "  Key UID: None")?;
        }

        writeln!(f, "  Capabilities: {}", self.capabilities)?;

        write!(f, "  Secure channel public key: ")?;
        if let Some(ref public_key) = self.public_key {
            write!(
                f,
                "0x{}",
                hex::encode(public_key.to_encoded_point(false).as_bytes())
            )
        } else {
            write!(f, "None")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn primitive(tag: u8, value: &[u8]) -> Tlv {
        Tlv::new(Tag::try_from(tag).unwrap(), Value::Primitive(value.to_vec())).unwrap()
    }

    fn template(children: Vec<Tlv>) -> Tlv {
        Tlv::new(
            Tag::try_from(tags::TEMPLATE_APPLICATION_INFO).unwrap(),
            Value::Constructed(children),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_application_info() {
        let key = k256::SecretKey::random(&mut rand_v8::thread_rng()).public_key();
        let tlv = template(vec![
            primitive(tags::INSTANCE_UID, &[0xAB; 16]),
            primitive(tags::ECC_PUBLIC_KEY, key.to_encoded_point(false).as_bytes()),
            primitive(tags::OTHER, &[3, 1]),
            primitive(tags::OTHER, &[5]),
            primitive(tags::KEY_UID, &[]),
            primitive(tags::CAPABILITIES, &[0x0F]),
        ]);

        let info = ApplicationInfo::try_from(&tlv).unwrap();
        assert_eq!(info.instance_uid, [0xAB; 16]);
        assert_eq!(info.public_key, Some(key));
        assert_eq!(info.version, Version::new(3, 1));
        assert_eq!(info.remaining_slots, 5);
        assert_eq!(info.key_uid, None);
        assert!(info.to_string().contains("Remaining pairing slots: 5"));
    }

    #[test]
    fn test_missing_fields_are_errors() {
        let tlv = template(vec![primitive(tags::INSTANCE_UID, &[0xAB; 16])]);
        assert!(matches!(
            ApplicationInfo::try_from(&tlv),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_bad_key_uid_length() {
        let tlv = template(vec![
            primitive(tags::INSTANCE_UID, &[0xAB; 16]),
            primitive(tags::OTHER, &[3, 1]),
            primitive(tags::OTHER, &[5]),
            primitive(tags::KEY_UID, &[0x01; 5]),
        ]);
        assert!(ApplicationInfo::try_from(&tlv).is_err());
    }
}
