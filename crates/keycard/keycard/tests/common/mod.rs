//! A software Keycard for driving sessions without hardware

#![allow(dead_code, unreachable_pub)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use cardlink_apdu_core::{CardConnector, CardTransport, Command, TransportError};
use cardlink_keycard::{EntropyError, Secrets, SecretsGenerator, one_shot_decrypt, tags};
use iso7816_tlv::ber::{Tag, Tlv, Value};
use k256::SecretKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use parking_lot::Mutex;

pub const PIN: &str = "123456";
pub const PUK: &str = "123456789012";
pub const PAIRING_PASSWORD: &str = "A1b2C3d4E5f6G7h8";

/// What the emulated card has seen
#[derive(Debug, Default)]
pub struct CardState {
    /// Decrypted INIT payload, once provisioned
    pub provisioned: Option<Vec<u8>>,
    /// Every command received
    pub commands: Vec<Bytes>,
}

/// Emulates the SELECT and INIT behaviour of a Keycard applet
#[derive(Debug, Clone)]
pub struct SoftwareCard {
    key: SecretKey,
    state: Arc<Mutex<CardState>>,
    connected: bool,
}

impl SoftwareCard {
    pub fn new() -> Self {
        Self {
            key: SecretKey::random(&mut rand_v8::thread_rng()),
            state: Arc::default(),
            connected: true,
        }
    }

    /// A card that has already been through INIT
    pub fn provisioned() -> Self {
        let card = Self::new();
        card.state.lock().provisioned = Some(Vec::new());
        card
    }

    pub fn state(&self) -> Arc<Mutex<CardState>> {
        Arc::clone(&self.state)
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.key.public_key().to_encoded_point(false).as_bytes().to_vec()
    }

    fn select(&self, provisioned: bool) -> Vec<u8> {
        if !provisioned {
            let mut response = vec![0x80, 0x41];
            response.extend(self.public_key_bytes());
            return response;
        }

        let primitive = |tag: u8, value: Vec<u8>| {
            Tlv::new(Tag::try_from(tag).unwrap(), Value::Primitive(value)).unwrap()
        };
        Tlv::new(
            Tag::try_from(tags::TEMPLATE_APPLICATION_INFO).unwrap(),
            Value::Constructed(vec![
                primitive(tags::INSTANCE_UID, vec![0x5A; 16]),
                primitive(tags::ECC_PUBLIC_KEY, self.public_key_bytes()),
                primitive(tags::OTHER, vec![3, 1]),
                primitive(tags::OTHER, vec![5]),
                primitive(tags::KEY_UID, Vec::new()),
                primitive(tags::CAPABILITIES, vec![0x0F]),
            ]),
        )
        .unwrap()
        .to_vec()
    }

    fn respond(&self, command: &Command) -> (Vec<u8>, [u8; 2]) {
        let mut state = self.state.lock();
        match (command.cla, command.ins) {
            (0x00, 0xA4) => (self.select(state.provisioned.is_some()), [0x90, 0x00]),
            (0x80, 0xFE) if state.provisioned.is_some() => (Vec::new(), [0x6D, 0x00]),
            (0x80, 0xFE) => {
                let data = command.data.as_deref().unwrap_or_default();
                match one_shot_decrypt(&self.key, data) {
                    Ok(plaintext) => {
                        state.provisioned = Some(plaintext.to_vec());
                        (Vec::new(), [0x90, 0x00])
                    }
                    Err(_) => (Vec::new(), [0x6A, 0x80]),
                }
            }
            _ => (Vec::new(), [0x6D, 0x00]),
        }
    }
}

impl CardTransport for SoftwareCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::Closed);
        }
        self.state.lock().commands.push(Bytes::copy_from_slice(command));

        let parsed = Command::from_bytes(command).map_err(|e| TransportError::other(e.to_string()))?;
        let (mut data, status) = self.respond(&parsed);
        data.extend_from_slice(&status);
        Ok(data.into())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }
}

/// Hands out channels to the same emulated card
#[derive(Debug, Clone)]
pub struct SoftwareConnector(pub SoftwareCard);

impl CardConnector for SoftwareConnector {
    type Transport = SoftwareCard;

    fn open(&self) -> Result<SoftwareCard, TransportError> {
        let mut card = self.0.clone();
        card.connected = true;
        Ok(card)
    }
}

/// Always produces the same credentials
#[derive(Debug, Default)]
pub struct FixedSecrets {
    calls: Arc<AtomicUsize>,
}

impl FixedSecrets {
    /// Shared count of `generate` calls, readable after the generator moved
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl SecretsGenerator for FixedSecrets {
    fn generate(&mut self) -> Result<Secrets, EntropyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Secrets::new(PIN, PUK, PAIRING_PASSWORD).expect("valid fixed secrets"))
    }
}

/// A random source that is never available
#[derive(Debug)]
pub struct NoEntropy;

impl SecretsGenerator for NoEntropy {
    fn generate(&mut self) -> Result<Secrets, EntropyError> {
        Err(EntropyError::new("getrandom unavailable"))
    }
}

/// SELECT response of an uninitialized card with the given key
pub fn uninitialized_select(key: &SecretKey) -> Bytes {
    let mut response = vec![0x80, 0x41];
    response.extend_from_slice(key.public_key().to_encoded_point(false).as_bytes());
    response.extend_from_slice(&[0x90, 0x00]);
    response.into()
}
