use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use cardlink_apdu_core::{CardTransport, TransportError};
use tracing::debug;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// One connected period of a card
///
/// A link is created on every connect and closed on the matching disconnect. It
/// is never reopened.
#[derive(Debug)]
pub(crate) struct Link {
    id: u64,
    closed: AtomicBool,
}

impl Link {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A channel that stops carrying commands once its link is closed
///
/// The closed flag is checked before and after every exchange, so a disconnect
/// is seen within one command/response cycle even when the underlying
/// transport has not noticed yet.
#[derive(Debug)]
pub struct GuardedTransport<T> {
    inner: T,
    link: Arc<Link>,
}

impl<T: CardTransport> GuardedTransport<T> {
    pub(crate) const fn new(inner: T, link: Arc<Link>) -> Self {
        Self { inner, link }
    }

    /// Give back the wrapped channel
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: CardTransport> CardTransport for GuardedTransport<T> {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if self.link.is_closed() {
            return Err(TransportError::Closed);
        }

        let response = self.inner.transmit_raw(command)?;

        if self.link.is_closed() {
            debug!(link = self.link.id(), "Card disconnected during exchange, discarding response");
            return Err(TransportError::Cancelled);
        }
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        !self.link.is_closed() && self.inner.is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        if self.link.is_closed() {
            return Err(TransportError::Closed);
        }
        self.inner.reset()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
