use cardlink_apdu_core::{StatusWord, TransportError};
use iso7816_tlv::TlvError;

use crate::secrets::EntropyError;
use crate::session::SessionState;
use crate::validation::ValidationError;

/// Result type for Keycard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Keycard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The channel failed to carry a command or its response
    #[error(transparent)]
    Transport(TransportError),

    /// APDU framing or response errors below the command layer
    #[error(transparent)]
    Apdu(cardlink_apdu_core::Error),

    /// The card answered a command with a non-success status word
    #[error("{command} failed with status {status}: {}", .status.description())]
    CardProtocol {
        /// Name of the rejected command
        command: &'static str,
        /// Status word returned by the card
        status: StatusWord,
    },

    /// The secure random source could not provide entropy
    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// `init` was called while another initialization is in flight
    #[error("Session busy: initialization already in progress")]
    SessionBusy,

    /// The card disconnected while a command sequence was running
    #[error("Session closed: card disconnected during the operation")]
    SessionClosed,

    /// The requested operation is not valid in the current session state
    #[error("Operation not allowed in session state {0}")]
    InvalidSessionState(SessionState),

    /// SELECT reported a card that already holds credentials
    #[error("Already initialised")]
    AlreadyInitialised,

    /// A response or argument could not be used as given
    #[error("Invalid data: {0}")]
    InvalidData(&'static str),

    /// A secret or setting failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Decrypted data carried invalid padding
    #[error("Unpad error")]
    UnpadError(#[from] cipher::block_padding::UnpadError),

    /// Plaintext could not be padded into the buffer
    #[error("Pad error")]
    PadError(#[from] cipher::inout::PadError),

    /// Malformed BER-TLV in a card response
    #[error("TlvError: {0}")]
    TlvError(TlvError),

    /// Invalid curve point or scalar
    #[error(transparent)]
    EllipticCurveError(#[from] k256::elliptic_curve::Error),
}

impl Error {
    /// Status word reported by the card, if the card rejected a command
    pub const fn status(&self) -> Option<StatusWord> {
        match self {
            Self::CardProtocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the channel itself reported the card gone
    pub const fn is_link_lost(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_link_lost())
    }
}

impl From<TlvError> for Error {
    fn from(error: TlvError) -> Self {
        Self::TlvError(error)
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

// Transport failures surface unchanged, whatever context the executor added.
impl From<cardlink_apdu_core::Error> for Error {
    fn from(error: cardlink_apdu_core::Error) -> Self {
        match error.into_root() {
            cardlink_apdu_core::Error::Transport(e) => Self::Transport(e),
            other => Self::Apdu(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_apdu_core::ResultExt;

    #[test]
    fn test_transport_error_unwrapped_from_context() {
        let apdu: cardlink_apdu_core::Result<()> =
            Err(TransportError::Timeout).context("sending SELECT");
        let err = Error::from(apdu.unwrap_err());
        assert!(matches!(err, Error::Transport(TransportError::Timeout)));
        assert!(!err.is_link_lost());
    }

    #[test]
    fn test_closed_channel_is_link_lost() {
        let apdu: cardlink_apdu_core::Result<()> =
            Err(TransportError::Closed).context("sending INIT");
        assert!(Error::from(apdu.unwrap_err()).is_link_lost());
        assert!(Error::Transport(TransportError::Cancelled).is_link_lost());
        assert!(!Error::SessionClosed.is_link_lost());
    }

    #[test]
    fn test_card_protocol_display() {
        let err = Error::CardProtocol {
            command: "SELECT",
            status: StatusWord::new(0x6A, 0x82),
        };
        assert_eq!(err.to_string(), "SELECT failed with status 6A82: File not found");
        assert_eq!(err.status(), Some(StatusWord::new(0x6A, 0x82)));
    }
}
