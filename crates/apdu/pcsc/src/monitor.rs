//! Monitor implementation for PC/SC events

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use pcsc::{Context, ReaderState, State};
use tracing::{debug, info, trace, warn};

use crate::error::PcscError;
use crate::event::{
    CardEvent, CardEventHandler, CardEventSender, ReaderEvent, ReaderEventHandler,
    ReaderEventSender, card_event_sink, reader_event_sink,
};
use crate::reader::card_present;

/// Monitor for PC/SC reader and card events
///
/// A single background thread waits on `SCardGetStatusChange` and reports card
/// insertions and removals, plus readers appearing and disappearing.
pub struct PcscMonitor {
    /// PC/SC context
    context: Context,
    /// Upper bound on a single status-change wait
    poll_timeout: Duration,
    /// Whether the monitor is running
    running: Arc<AtomicBool>,
    /// Monitoring thread
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for PcscMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscMonitor")
            .field("poll_timeout", &self.poll_timeout)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl PcscMonitor {
    pub(crate) fn new(context: Context, poll_timeout: Duration) -> Self {
        Self {
            context,
            poll_timeout,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Whether the monitoring thread is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Monitor card and reader events with callbacks
    pub fn monitor<C, R>(&self, cards: C, readers: R) -> Result<(), PcscError>
    where
        C: CardEventHandler + Send + 'static,
        R: ReaderEventHandler + Send + 'static,
    {
        let mut handle = self.handle.lock();
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(PcscError::MonitorRunning);
        }

        let watcher = Watcher {
            context: self.context.clone(),
            poll_timeout: self.poll_timeout,
            running: Arc::clone(&self.running),
            slots: SlotTracker::default(),
            cards,
            readers,
        };

        let spawned = thread::Builder::new()
            .name("pcsc-monitor".into())
            .spawn(move || watcher.run());

        match spawned {
            Ok(join) => {
                *handle = Some(join);
                info!("PC/SC monitor started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(PcscError::Other(format!("Failed to spawn monitor thread: {e}")))
            }
        }
    }

    /// Monitor card and reader events using channels
    pub fn monitor_channels(
        &self,
        cards: CardEventSender,
        readers: ReaderEventSender,
    ) -> Result<(), PcscError> {
        self.monitor(card_event_sink(cards), reader_event_sink(readers))
    }

    /// Stop monitoring and wait for the monitoring thread to exit
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        // Wake a blocked status-change wait
        if let Err(e) = self.context.cancel() {
            debug!(error = %e, "Failed to cancel pending status change");
        }

        if let Some(join) = self.handle.lock().take() {
            if join.thread().id() != thread::current().id() && join.join().is_err() {
                warn!("PC/SC monitor thread panicked");
            }
        }
        info!("PC/SC monitor stopped");
    }
}

impl Drop for PcscMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Watcher<C, R> {
    context: Context,
    poll_timeout: Duration,
    running: Arc<AtomicBool>,
    slots: SlotTracker,
    cards: C,
    readers: R,
}

impl<C: CardEventHandler, R: ReaderEventHandler> Watcher<C, R> {
    fn run(mut self) {
        let mut states = self.refresh_readers();

        while self.running.load(Ordering::Acquire) {
            match self
                .context
                .get_status_change(Some(self.poll_timeout), &mut states)
            {
                Ok(()) => {}
                Err(pcsc::Error::Timeout) => continue,
                Err(pcsc::Error::Cancelled) => break,
                Err(e) => {
                    debug!(error = %e, "Status change wait failed, rescanning readers");
                    thread::sleep(self.poll_timeout);
                    states = self.refresh_readers();
                    continue;
                }
            }

            let mut readers_changed = false;
            for state in &states {
                let event_state = state.event_state();
                if state.name() == pcsc::PNP_NOTIFICATION() {
                    readers_changed |= event_state.contains(State::CHANGED);
                    continue;
                }
                if event_state.intersects(State::UNKNOWN | State::IGNORE) {
                    readers_changed = true;
                    continue;
                }

                let reader = state.name().to_string_lossy();
                trace!(%reader, state = ?event_state, "Reader state changed");
                if let Some(event) = self.slots.observe(&reader, event_state, state.atr()) {
                    self.cards.handle_event(event);
                }
            }

            for state in &mut states {
                state.sync_current_state();
            }

            if readers_changed {
                states = self.refresh_readers();
            }
        }

        debug!("PC/SC monitor loop exited");
    }

    /// Rebuild the wait set from the current reader list, reporting differences
    fn refresh_readers(&mut self) -> Vec<ReaderState> {
        let names: Vec<CString> = match self.context.list_readers_owned() {
            Ok(names) => names,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => {
                debug!(error = %e, "Failed to list readers");
                Vec::new()
            }
        };

        let current: Vec<String> = names
            .iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        let (reader_events, card_events) = self.slots.sync_readers(&current);
        for event in card_events {
            self.cards.handle_event(event);
        }
        for event in reader_events {
            self.readers.handle_event(event);
        }

        let mut states = Vec::with_capacity(names.len() + 1);
        states.push(ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE));
        states.extend(
            names
                .into_iter()
                .map(|name| ReaderState::new(name, State::UNAWARE)),
        );
        states
    }
}

/// Tracks which readers exist and which card (by ATR) each one holds
#[derive(Debug, Default)]
pub(crate) struct SlotTracker {
    slots: HashMap<String, Option<Vec<u8>>>,
}

impl SlotTracker {
    /// Reconcile the known readers with `current`
    ///
    /// A reader that disappears while holding a card reports the card removal
    /// before the reader removal.
    pub(crate) fn sync_readers(&mut self, current: &[String]) -> (Vec<ReaderEvent>, Vec<CardEvent>) {
        let mut reader_events = Vec::new();
        let mut card_events = Vec::new();

        let gone: Vec<String> = self
            .slots
            .keys()
            .filter(|name| !current.contains(*name))
            .cloned()
            .collect();
        for name in gone {
            if let Some(Some(_)) = self.slots.remove(&name) {
                card_events.push(CardEvent::Removed {
                    reader: name.clone(),
                });
            }
            reader_events.push(ReaderEvent::Removed(name));
        }

        for name in current {
            if !self.slots.contains_key(name) {
                self.slots.insert(name.clone(), None);
                reader_events.push(ReaderEvent::Added(name.clone()));
            }
        }

        (reader_events, card_events)
    }

    /// Fold one reader state into the tracker, producing at most one card event
    pub(crate) fn observe(&mut self, reader: &str, state: State, atr: &[u8]) -> Option<CardEvent> {
        let slot = self.slots.entry(reader.to_string()).or_default();

        if card_present(state) && !state.contains(State::MUTE) {
            if slot.as_deref() == Some(atr) {
                return None;
            }
            *slot = Some(atr.to_vec());
            return Some(CardEvent::Inserted {
                reader: reader.to_string(),
                atr: atr.to_vec(),
            });
        }

        if state.contains(State::EMPTY) {
            return slot.take().map(|_| CardEvent::Removed {
                reader: reader.to_string(),
            });
        }

        None
    }
}
