//! Core error type for all APDU operations
//!
//! Transport and response failures are kept as distinct variants so callers can
//! tell a link-level failure apart from a card that answered with a bad status.

use crate::response::error::{ResponseError, StatusError};
use crate::transport::TransportError;

/// Result type for APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The channel failed to carry the command or its response
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response bytes could not be interpreted
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// Invalid command length
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Invalid command data
    #[error("Invalid command data: {0}")]
    InvalidCommandData(&'static str),

    /// The card kept answering `61xx` past the configured chain limit
    #[error("Chain limit exceeded")]
    ChainLimitExceeded,

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },

    /// Generic dynamic error with string message
    #[error("{0}")]
    Message(String),
}

impl From<StatusError> for Error {
    fn from(error: StatusError) -> Self {
        Self::Response(error.into())
    }
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new error with a dynamic message
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self::Message(message.into())
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Consume the error, returning the underlying error without context wrappers
    pub fn into_root(self) -> Self {
        match self {
            Self::Context { source, .. } => source.into_root(),
            other => other,
        }
    }

    /// The transport error at the root of this error, if any
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self.root() {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Extension trait for Result with APDU Errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_unwraps_to_root() {
        let err = Error::from(TransportError::Transmission)
            .with_context("sending SELECT")
            .with_context("initializing card");

        assert!(matches!(
            err.transport_error(),
            Some(TransportError::Transmission)
        ));
        assert_eq!(
            err.to_string(),
            "initializing card: sending SELECT: Failed to transmit data"
        );
        assert!(matches!(
            err.into_root(),
            Error::Transport(TransportError::Transmission)
        ));
    }
}
