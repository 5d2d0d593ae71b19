//! Channel-based event handling for PC/SC operations

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::event::{CardEvent, ReaderEvent};

/// Sender for card events
pub type CardEventSender = Sender<CardEvent>;
/// Receiver for card events
pub type CardEventReceiver = Receiver<CardEvent>;

/// Sender for reader events
pub type ReaderEventSender = Sender<ReaderEvent>;
/// Receiver for reader events
pub type ReaderEventReceiver = Receiver<ReaderEvent>;

/// Create an unbounded channel for card events
pub fn card_event_channel() -> (CardEventSender, CardEventReceiver) {
    unbounded()
}

/// Create an unbounded channel for reader events
pub fn reader_event_channel() -> (ReaderEventSender, ReaderEventReceiver) {
    unbounded()
}

/// Create a bounded channel with the specified capacity for card events
pub fn bounded_card_event_channel(capacity: usize) -> (CardEventSender, CardEventReceiver) {
    bounded(capacity)
}

/// Adapt a card event sender into a handler
///
/// Events sent after the receiver is dropped are discarded.
pub fn card_event_sink(sender: CardEventSender) -> impl FnMut(CardEvent) + Send + 'static {
    move |event| {
        let _ = sender.send(event);
    }
}

/// Adapt a reader event sender into a handler
pub fn reader_event_sink(sender: ReaderEventSender) -> impl FnMut(ReaderEvent) + Send + 'static {
    move |event| {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CardEventHandler, ReaderEventHandler};

    #[test]
    fn test_sink_as_handler() {
        let (tx, rx) = card_event_channel();
        let mut sink = card_event_sink(tx);
        sink.handle_event(CardEvent::Removed {
            reader: "Reader 0".into(),
        });
        assert_eq!(rx.try_recv().unwrap().reader(), "Reader 0");
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = reader_event_channel();
        drop(rx);
        let mut sink = reader_event_sink(tx);
        sink.handle_event(ReaderEvent::Added("Reader 0".into()));
    }
}
