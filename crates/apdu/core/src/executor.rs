//! Command execution on top of a card transport
//!
//! The [`CardExecutor`] turns typed [`ApduCommand`]s into raw exchanges and folds
//! `61xx` continuation responses back into a single response.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::command::{ApduCommand, Command, MAX_SHORT_DATA_LENGTH};
use crate::error::{Error, ResultExt};
use crate::transport::CardTransport;
use crate::Response;

/// Default number of GET RESPONSE continuations followed before giving up
pub const DEFAULT_MAX_CHAIN: usize = 10;

/// Executes APDU commands against a card
pub trait Executor: Send + fmt::Debug {
    /// The underlying transport type
    type Transport: CardTransport;

    /// Get a reference to the transport
    fn transport(&self) -> &Self::Transport;

    /// Get a mutable reference to the transport
    fn transport_mut(&mut self) -> &mut Self::Transport;

    /// Transmit raw command bytes and return the complete response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error>;

    /// Reset the executor and its transport
    fn reset(&mut self) -> Result<(), Error>;

    /// Execute a typed command and parse its response
    fn execute<C>(&mut self, command: &C) -> Result<C::Success, C::Error>
    where
        C: ApduCommand,
    {
        // Lc is a single byte in a short APDU
        if command.data().is_some_and(|data| data.len() > MAX_SHORT_DATA_LENGTH) {
            return Err(Error::InvalidCommandLength(command.command_length()).into());
        }

        let bytes = self
            .transmit_raw(&command.to_bytes())
            .context(format!("sending {}", C::NAME))?;
        C::parse_response_raw(bytes)
    }
}

/// Card executor following GET RESPONSE chains
pub struct CardExecutor<T: CardTransport> {
    /// The transport used for communication
    transport: T,
    /// Maximum number of `61xx` continuations
    max_chain: usize,
    /// The last complete response received
    last_response: Option<Bytes>,
}

impl<T: CardTransport> fmt::Debug for CardExecutor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardExecutor")
            .field("transport", &self.transport)
            .field("max_chain", &self.max_chain)
            .field("last_response_len", &self.last_response.as_ref().map(Bytes::len))
            .finish()
    }
}

impl<T: CardTransport> CardExecutor<T> {
    /// Create a new card executor with the given transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            max_chain: DEFAULT_MAX_CHAIN,
            last_response: None,
        }
    }

    /// Set the maximum number of GET RESPONSE continuations
    pub const fn with_max_chain(mut self, max_chain: usize) -> Self {
        self.max_chain = max_chain;
        self
    }

    /// Get the last response received
    pub const fn last_response(&self) -> Option<&Bytes> {
        self.last_response.as_ref()
    }

    /// Consume the executor and hand back the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn exchange(&mut self, command: &[u8]) -> Result<Response, Error> {
        let raw = self.transport.transmit_raw(command)?;
        Ok(Response::from_bytes(&raw)?)
    }
}

impl<T: CardTransport> Executor for CardExecutor<T> {
    type Transport = T;

    fn transport(&self) -> &T {
        &self.transport
    }

    fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        let mut response = self.exchange(command)?;
        let mut chained = 0;

        while let Some(available) = response.bytes_available() {
            if chained >= self.max_chain {
                warn!(max_chain = self.max_chain, "GET RESPONSE chain limit reached");
                return Err(Error::ChainLimitExceeded);
            }
            chained += 1;
            trace!(available, chained, "Fetching remaining response data");

            let get_response = Command::new_with_le(0x00, 0xC0, 0x00, 0x00, available);
            let next = self
                .exchange(&get_response.to_bytes())
                .context("GET RESPONSE")?;
            response.append(next);
        }

        let status = response.status_tuple();
        debug!(
            sw = format_args!("{:02X}{:02X}", status.0, status.1),
            chained, "Command completed"
        );

        let bytes: Bytes = response.into();
        self.last_response = Some(bytes.clone());
        Ok(bytes)
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.transport
            .reset()
            .context("Failed to reset transport")?;
        self.last_response = None;
        Ok(())
    }
}
