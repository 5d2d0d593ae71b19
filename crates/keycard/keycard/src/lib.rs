//! Keycard provisioning over APDU
//!
//! This crate generates card credentials, speaks the two commands needed to
//! provision a Keycard (SELECT and INIT) and runs them from a [`SessionManager`]
//! that follows card connect and disconnect notifications.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cardlink_keycard::{SessionConfig, SessionManager};
//! # fn open_channel() -> cardlink_apdu_core::transport::mock::MockTransport { unimplemented!() }
//!
//! let session = SessionManager::new(SessionConfig::default());
//! session.on_connected(open_channel());
//!
//! let secrets = session.init()?;
//! println!("PIN: {}", secrets.pin());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod command_set;
mod commands;
mod constants;
mod crypto;
mod error;
mod secrets;
mod session;
mod types;
mod validation;

pub use command_set::CommandSet;
pub use commands::*;
pub use constants::*;
pub use crypto::{PairingToken, generate_pairing_token, one_shot_decrypt, one_shot_encrypt};
pub use error::{Error, Result};
pub use secrets::{EntropyError, RandomSecrets, Secrets, SecretsGenerator};
pub use session::{
    ChannelObserver, GuardedTransport, SessionConfig, SessionEvent, SessionManager,
    SessionObserver, SessionState,
};
pub use types::{ApplicationInfo, Capabilities, Capability, Version};
pub use validation::{ValidationError, ValidationResult};

pub use cardlink_apdu_core::prelude::CardExecutor;

use derive_more::Display;

/// Represents the version of the applet protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum AppletVersion {
    /// Versions before 3.1
    #[default]
    #[display("legacy")]
    #[cfg_attr(feature = "cli", value(name = "legacy"))]
    Legacy,
    /// Version 3.1 and above
    #[display("v3.1")]
    #[cfg_attr(feature = "cli", value(name = "v3.1"))]
    V3_1,
}

/// Create a Keycard instance AID with the specified index
///
/// Instance indices start at 1; index 1 is [`KEYCARD_AID`].
pub fn keycard_instance_aid(index: u8) -> Result<Vec<u8>> {
    if index == 0 {
        return Err(Error::InvalidData("Keycard instance index starts at 1"));
    }
    let (_, package) = KEYCARD_AID
        .split_last()
        .ok_or(Error::InvalidData("Empty Keycard AID"))?;
    let mut aid = package.to_vec();
    aid.push(index);
    Ok(aid)
}
