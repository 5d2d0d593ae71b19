/// Keycard applet AID (instance 1)
pub const KEYCARD_AID: &[u8] = b"\xA0\x00\x00\x08\x04\x00\x01\x01";

/// Class byte for Keycard proprietary commands
pub const CLA_GP: u8 = 0x80;

/// Instruction byte of the INIT command
pub const INS_INIT: u8 = 0xFE;

/// Number of digits in a PIN
pub const PIN_LENGTH: usize = 6;
/// Number of digits in a PUK
pub const PUK_LENGTH: usize = 12;
/// Number of characters in a generated pairing password
pub const PAIRING_PASSWORD_LENGTH: usize = 16;
/// Random bytes behind a generated pairing password (base64url, no padding)
pub const PAIRING_PASSWORD_ENTROPY: usize = 12;

/// Salt for deriving the pairing token from the pairing password
pub const PAIRING_TOKEN_SALT: &str = "Keycard Pairing Password Salt";
/// PBKDF2 rounds for the pairing token
pub const PAIRING_TOKEN_ITERATIONS: u32 = 50_000;
/// Length of the derived pairing token
pub const PAIRING_TOKEN_LENGTH: usize = 32;

/// Default number of PIN attempts configured at INIT (v3.1+)
pub const DEFAULT_MAX_PIN_ATTEMPTS: u8 = 3;
/// Default number of PUK attempts configured at INIT (v3.1+)
pub const DEFAULT_MAX_PUK_ATTEMPTS: u8 = 5;

/// Shortest AID ISO 7816-4 allows
pub const AID_MIN_LENGTH: usize = 5;
/// Longest AID ISO 7816-4 allows
pub const AID_MAX_LENGTH: usize = 16;

/// BER-TLV tags in SELECT responses
pub mod tags {
    /// Application info template containing:
    /// - TAG_INSTANCE_UID
    /// - TAG_ECC_PUBLIC_KEY
    /// - TAG_OTHER (application version and number remaining pairing slots)
    /// - TAG_KEY_UID
    /// - TAG_CAPABILITIES
    pub const TEMPLATE_APPLICATION_INFO: u8 = 0xA4;

    /// Instance UID (16 bytes)
    pub const INSTANCE_UID: u8 = 0x8F;
    /// ECC Public Key (Uncompressed, ie. 65 bytes, or 0 bytes if not available)
    pub const ECC_PUBLIC_KEY: u8 = 0x80;
    /// Application version (2 bytes) / number of remaining pairing slots (1 byte)
    pub const OTHER: u8 = 0x02;
    /// Key UID (32 bytes)
    pub const KEY_UID: u8 = 0x8E;
    /// Keycard capabilities (1 byte)
    pub const CAPABILITIES: u8 = 0x8D;
}
