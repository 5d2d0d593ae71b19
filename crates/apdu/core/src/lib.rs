//! Core traits and types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types and traits for working with smart card
//! APDU commands and responses according to ISO/IEC 7816-4.
//!
//! ## Overview
//!
//! A card is reached through a [`CardTransport`], a byte-oriented channel to exactly
//! one connected card. On top of that this crate provides:
//!
//! - Creating and parsing APDU commands and responses
//! - Status word interpretation
//! - A [`CardExecutor`] that runs typed commands and follows `61xx` GET RESPONSE chains
//!
//! Transports never retry. Retry policy belongs to whoever owns the channel.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod executor;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result, ResultExt};

pub use command::{ApduCommand, Command};
pub use executor::{CardExecutor, Executor};
pub use response::status::StatusWord;
pub use response::{ApduResponse, Response};
pub use transport::{CardConnector, CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Error, Response, Result,
        command::ApduCommand,
        executor::{CardExecutor, Executor},
        response::ApduResponse,
        response::status::StatusWord,
        transport::{CardConnector, CardTransport, TransportError},
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.class(), 0x00);
        assert_eq!(cmd.instruction(), 0xA4);
        assert_eq!(cmd.p1(), 0x04);
        assert_eq!(cmd.p2(), 0x00);

        let resp = Response::success(Some(Bytes::from_static(&[0x01, 0x02, 0x03])));
        assert!(resp.is_success());
        assert_eq!(
            resp.payload().as_deref(),
            Some([0x01, 0x02, 0x03].as_slice())
        );
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
