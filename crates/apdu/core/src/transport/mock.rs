//! Scripted in-memory transport for tests

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::{CardTransport, TransportError};

/// Handle onto the commands a [`MockTransport`] has seen, usable after the
/// transport itself has been moved elsewhere
pub type CommandLog = Arc<Mutex<Vec<Bytes>>>;

type TransmitHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Mock transport returning scripted responses in order
pub struct MockTransport {
    /// Responses to return, in order
    responses: VecDeque<Result<Bytes, TransportError>>,
    /// Commands that were sent
    commands: CommandLog,
    /// Whether the transport is connected
    connected: bool,
    /// Invoked after each command is recorded, before the response is returned
    on_transmit: Option<TransmitHook>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("pending_responses", &self.responses.len())
            .field("commands", &self.commands.lock().len())
            .field("connected", &self.connected)
            .finish()
    }
}

impl MockTransport {
    /// Create a new mock transport with the given responses
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        Self {
            responses: responses.into_iter().map(Ok).collect(),
            commands: CommandLog::default(),
            connected: true,
            on_transmit: None,
        }
    }

    /// Create a new mock transport that answers a single command with `90 00`
    pub fn with_success() -> Self {
        Self::new([Bytes::from_static(&[0x90, 0x00])])
    }

    /// Queue a response
    pub fn push_response(&mut self, response: Bytes) -> &mut Self {
        self.responses.push_back(Ok(response));
        self
    }

    /// Queue a transport failure
    pub fn push_error(&mut self, error: TransportError) -> &mut Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Run `hook` with the zero-based command index on every transmission
    pub fn on_transmit<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_transmit = Some(Arc::new(hook));
        self
    }

    /// Shared log of every command transmitted
    pub fn command_log(&self) -> CommandLog {
        Arc::clone(&self.commands)
    }

    /// Snapshot of the commands transmitted so far
    pub fn commands(&self) -> Vec<Bytes> {
        self.commands.lock().clone()
    }
}

impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if !self.connected {
            return Err(TransportError::Closed);
        }

        let index = {
            let mut log = self.commands.lock();
            log.push(Bytes::copy_from_slice(command));
            log.len() - 1
        };

        if let Some(hook) = &self.on_transmit {
            hook(index);
        }

        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::Transmission))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_and_replays() {
        let mut transport = MockTransport::new([
            Bytes::from_static(&[0x90, 0x00]),
            Bytes::from_static(&[0x6A, 0x82]),
        ]);
        let log = transport.command_log();

        assert_eq!(
            transport.transmit_raw(&[0x00, 0xA4]).unwrap().as_ref(),
            &[0x90, 0x00]
        );
        assert_eq!(
            transport.transmit_raw(&[0x80, 0xFE]).unwrap().as_ref(),
            &[0x6A, 0x82]
        );
        assert_eq!(
            transport.transmit_raw(&[0x00]),
            Err(TransportError::Transmission)
        );
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_mock_closed() {
        let mut transport = MockTransport::with_success();
        transport.close();
        assert!(!transport.is_connected());
        assert_eq!(transport.transmit_raw(&[0x00]), Err(TransportError::Closed));
        assert!(transport.commands().is_empty());
    }

    #[test]
    fn test_mock_hook_sees_index() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut transport = MockTransport::new([
            Bytes::from_static(&[0x90, 0x00]),
            Bytes::from_static(&[0x90, 0x00]),
        ])
        .on_transmit(move |index| sink.lock().push(index));

        transport.transmit_raw(&[0x01]).unwrap();
        transport.transmit_raw(&[0x02]).unwrap();
        assert_eq!(*seen.lock(), vec![0, 1]);
    }
}
