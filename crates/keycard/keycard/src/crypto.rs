//! Cryptographic primitives for card initialization
//!
//! INIT carries the credentials encrypted to the card's public key: the host
//! performs an ephemeral secp256k1 ECDH with the card and encrypts the payload
//! with AES-256-CBC under the shared secret, ISO 7816 padded.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Iso7816};
use bytes::{BufMut, Bytes, BytesMut};
use k256::{PublicKey, SecretKey, ecdh::SharedSecret, elliptic_curve::sec1::ToEncodedPoint};
use pbkdf2::pbkdf2_hmac;
use rand::TryRngCore;
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use crate::constants::{PAIRING_TOKEN_ITERATIONS, PAIRING_TOKEN_LENGTH, PAIRING_TOKEN_SALT};
use crate::secrets::EntropyError;
use crate::{Error, Result};

/// Length of the AES-CBC initialization vector
pub(crate) const IV_LENGTH: usize = 16;

/// 32-byte token derived from the pairing password
pub type PairingToken = Zeroizing<[u8; PAIRING_TOKEN_LENGTH]>;

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

pub(crate) fn generate_ecdh_shared_secret(private: &SecretKey, public: &PublicKey) -> SharedSecret {
    k256::elliptic_curve::ecdh::diffie_hellman(private.to_nonzero_scalar(), public.as_affine())
}

/// Fill a fixed-size array from a fallible random source
pub(crate) fn random_array<const N: usize, R: TryRngCore>(
    rng: &mut R,
) -> std::result::Result<[u8; N], EntropyError> {
    let mut bytes = [0u8; N];
    rng.try_fill_bytes(&mut bytes).map_err(EntropyError::new)?;
    Ok(bytes)
}

/// Generate an ephemeral secp256k1 key from a fallible random source
pub(crate) fn ephemeral_secret_key<R: TryRngCore>(
    rng: &mut R,
) -> std::result::Result<SecretKey, EntropyError> {
    loop {
        let candidate = Zeroizing::new(random_array::<32, R>(rng)?);
        // Out-of-range scalars are astronomically rare; draw again.
        if let Ok(key) = SecretKey::from_slice(candidate.as_slice()) {
            return Ok(key);
        }
    }
}

/// Perform one-shot encryption of `plaintext` for the holder of `card_key`.
///
/// Output layout: `len(host key) | host key (uncompressed) | IV | ciphertext`.
pub fn one_shot_encrypt(
    card_key: &PublicKey,
    host_key: &SecretKey,
    iv: &[u8; IV_LENGTH],
    plaintext: &[u8],
) -> Result<Bytes> {
    let shared_secret = generate_ecdh_shared_secret(host_key, card_key);

    let mut buffer = Zeroizing::new(plaintext.to_vec());
    let msg_len = prepare_padding(&mut buffer);
    let ciphertext = Encryptor::new(shared_secret.raw_secret_bytes(), iv.into())
        .encrypt_padded_mut::<Iso7816>(&mut buffer, msg_len)?;

    let host_public = host_key.public_key().to_encoded_point(false);
    let mut out = BytesMut::with_capacity(1 + host_public.len() + IV_LENGTH + ciphertext.len());
    out.put_u8(host_public.len() as u8);
    out.put_slice(host_public.as_bytes());
    out.put_slice(iv);
    out.put_slice(ciphertext);

    Ok(out.freeze())
}

/// Reverse [`one_shot_encrypt`] with the card's private key.
///
/// This is the card side of INIT, used by card emulators.
pub fn one_shot_decrypt(card_key: &SecretKey, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let (&key_len, rest) = data
        .split_first()
        .ok_or(Error::InvalidData("Empty one-shot payload"))?;
    let key_len = key_len as usize;
    if rest.len() < key_len + IV_LENGTH {
        return Err(Error::InvalidData("Truncated one-shot payload"));
    }

    let (host_key, rest) = rest.split_at(key_len);
    let (iv, ciphertext) = rest.split_at(IV_LENGTH);
    let host_key = PublicKey::from_sec1_bytes(host_key)?;
    let shared_secret = generate_ecdh_shared_secret(card_key, &host_key);

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    let plaintext = Decryptor::new(shared_secret.raw_secret_bytes(), iv.into())
        .decrypt_padded_mut::<Iso7816>(&mut buffer)?;

    Ok(Zeroizing::new(plaintext.to_vec()))
}

/// Derive the pairing token Keycard expects from a pairing password (PBKDF2-HMAC-SHA256).
///
/// Both password and salt are NFKD normalized first.
pub fn generate_pairing_token(password: &str) -> PairingToken {
    let password = Zeroizing::new(password.nfkd().collect::<String>());
    let salt = PAIRING_TOKEN_SALT.nfkd().collect::<String>();

    let mut token = Zeroizing::new([0u8; PAIRING_TOKEN_LENGTH]);
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PAIRING_TOKEN_ITERATIONS,
        &mut token[..],
    );

    token
}

// Grow the buffer to the next multiple of 16, leaving room for at least one padding byte.
fn prepare_padding(data: &mut Vec<u8>) -> usize {
    let len = data.len();
    data.resize(len + 16 - len % 16, 0);

    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt_with(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
        let mut buffer = data.to_vec();
        let len = prepare_padding(&mut buffer);
        Encryptor::new(key.into(), iv.into())
            .encrypt_padded_mut::<Iso7816>(&mut buffer, len)
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_ecdh() {
        let pk1 = SecretKey::random(&mut rand_v8::thread_rng());
        let pk2 = SecretKey::random(&mut rand_v8::thread_rng());

        let shared_secret1 = generate_ecdh_shared_secret(&pk1, &pk2.public_key());
        let shared_secret2 = generate_ecdh_shared_secret(&pk2, &pk1.public_key());

        assert_eq!(
            shared_secret1.raw_secret_bytes(),
            shared_secret2.raw_secret_bytes()
        );
    }

    #[test]
    fn test_aes_cbc_iso7816_vector() {
        let data = hex::decode("A8A686D0E3290459BCB36088A8FD04A76BF13283BE4B1EAE2E1248EF609F94DC")
            .unwrap();
        let key = hex::decode("44D689AB4B18206F7EEE5439FB9A71A8A617406BA5259728D1EBC2786D24896C")
            .unwrap();
        let iv = hex::decode("9D3EF41EF1D221DD98A54AD5470F58F2").unwrap();

        let expected = hex::decode(
            "FFB41FED5F71A2B57A6AE62D5D5ECD1C12616F6464637DD0A7A930920ACBA55867A7E12CC4F06B089AF34FF4ED4BAB08",
        )
        .unwrap();
        assert_eq!(encrypt_with(&key, &iv, &data), expected);
    }

    #[test]
    fn test_one_shot_layout_and_decrypt() {
        let card = SecretKey::random(&mut rand_v8::thread_rng());
        let host = SecretKey::random(&mut rand_v8::thread_rng());
        let iv = [0x11u8; IV_LENGTH];
        let plaintext = b"123456123456789012";

        let data = one_shot_encrypt(&card.public_key(), &host, &iv, plaintext).unwrap();

        assert_eq!(data[0], 65);
        assert_eq!(
            &data[1..66],
            host.public_key().to_encoded_point(false).as_bytes()
        );
        assert_eq!(&data[66..82], &iv);
        // 18 bytes of payload pad to two blocks
        assert_eq!(data.len(), 82 + 32);

        let decrypted = one_shot_decrypt(&card, &data).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_one_shot_block_aligned_payload_gets_full_pad_block() {
        let card = SecretKey::random(&mut rand_v8::thread_rng());
        let host = SecretKey::random(&mut rand_v8::thread_rng());
        let plaintext = [0x42u8; 32];

        let data = one_shot_encrypt(&card.public_key(), &host, &[0u8; 16], &plaintext).unwrap();
        assert_eq!(data.len(), 82 + 48);
        assert_eq!(one_shot_decrypt(&card, &data).unwrap().as_slice(), &plaintext);
    }

    #[test]
    fn test_one_shot_decrypt_rejects_truncated() {
        let card = SecretKey::random(&mut rand_v8::thread_rng());
        assert!(matches!(
            one_shot_decrypt(&card, &[]),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            one_shot_decrypt(&card, &[65, 0x04, 0x01]),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_generate_pairing_token() {
        let token = generate_pairing_token("test-pass");
        assert_eq!(token.len(), PAIRING_TOKEN_LENGTH);

        // Same input should generate same token
        let token2 = generate_pairing_token("test-pass");
        assert_eq!(*token, *token2);
        assert_ne!(*token, *generate_pairing_token("test-pasS"));
    }

    #[test]
    fn test_pairing_token_is_normalized() {
        // U+00C5 and U+212B both decompose to "A" + U+030A under NFKD
        assert_eq!(
            *generate_pairing_token("\u{00C5}"),
            *generate_pairing_token("\u{212B}")
        );
    }

    #[test]
    fn test_random_array_reports_entropy_failure() {
        struct Broken;
        impl rand::TryRngCore for Broken {
            type Error = std::io::Error;
            fn try_next_u32(&mut self) -> std::result::Result<u32, Self::Error> {
                Err(std::io::Error::other("no entropy"))
            }
            fn try_next_u64(&mut self) -> std::result::Result<u64, Self::Error> {
                Err(std::io::Error::other("no entropy"))
            }
            fn try_fill_bytes(&mut self, _: &mut [u8]) -> std::result::Result<(), Self::Error> {
                Err(std::io::Error::other("no entropy"))
            }
        }

        assert!(random_array::<16, _>(&mut Broken).is_err());
        assert!(ephemeral_secret_key(&mut Broken).is_err());
    }
}
