//! Transport traits for APDU communication with cards
//!
//! A [`CardTransport`] is an open, byte-oriented channel to a single card. It has no
//! knowledge of command structure or protocol details and never retries: a failed
//! exchange is reported to the caller as-is.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

/// Trait for basic card transports
pub trait CardTransport: Send + fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes
    ///
    /// This method should handle the low-level communication with the card
    /// but should not interpret the contents or handle protocol-specific
    /// operations like GET RESPONSE.
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = %e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    /// This is the method that concrete implementations should override
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Close the channel. Any later transmission fails with [`TransportError::Closed`].
    ///
    /// Closing an already closed channel is a no-op.
    fn close(&mut self);
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Opens channels to a card
///
/// This is the transport-side half of a connection: the platform layer decides
/// when a card is reachable and calls [`CardConnector::open`] to obtain a channel.
pub trait CardConnector {
    /// The channel type produced by this connector
    type Transport: CardTransport;

    /// Open a channel to the card
    fn open(&self) -> Result<Self::Transport, TransportError>;
}
