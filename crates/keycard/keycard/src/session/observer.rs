use crossbeam_channel::Sender;
use derive_more::Display;

/// Outward notifications from a session, carrying no payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionEvent {
    /// A card channel was attached
    #[display("card connected")]
    Connected,
    /// The card channel went away
    #[display("card disconnected")]
    Disconnected,
}

/// Receives session notifications
///
/// Events arrive in the order the session changed state. The state lock is not
/// held, so an observer may call back into the session from the same thread.
pub trait SessionObserver: Send + Sync {
    /// Handle a session event
    fn on_event(&self, event: SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

/// Forwards session events into a crossbeam channel
#[derive(Debug, Clone)]
pub struct ChannelObserver(Sender<SessionEvent>);

impl ChannelObserver {
    /// Forward events to `sender`
    pub const fn new(sender: Sender<SessionEvent>) -> Self {
        Self(sender)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_event(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.0.send(event);
    }
}
