//! Follow card insertion and removal, optionally provisioning each new card

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use cardlink_apdu_pcsc::{
    CardEvent, PcscDeviceManager, PcscTransport, ReaderEvent, event::card_event_channel,
    event::reader_event_channel,
};
use cardlink_keycard::{Error as KeycardError, SessionConfig, SessionEvent, SessionManager};
use crossbeam_channel::select;
use tracing::{debug, warn};

use crate::utils::display;

type Session = SessionManager<PcscTransport>;

/// Watch readers until the monitor stops
pub fn watch_command(
    manager: &PcscDeviceManager,
    reader_filter: Option<&str>,
    init: bool,
    config: SessionConfig,
) -> Result<()> {
    let monitor = manager.monitor();
    let (card_tx, card_rx) = card_event_channel();
    let (reader_tx, reader_rx) = reader_event_channel();
    monitor
        .monitor_channels(card_tx, reader_tx)
        .context("Failed to start card monitor")?;

    println!("{}", display::info("Waiting for cards, press Ctrl-C to stop"));

    let mut sessions: HashMap<String, Arc<Session>> = HashMap::new();
    loop {
        select! {
            recv(card_rx) -> event => match event {
                Ok(event) if reader_filter.is_none_or(|name| name == event.reader()) => {
                    handle_card_event(manager, &mut sessions, &config, init, event);
                }
                Ok(event) => debug!(reader = event.reader(), "Ignoring event from other reader"),
                Err(_) => break,
            },
            recv(reader_rx) -> event => match event {
                Ok(ReaderEvent::Added(name)) => {
                    println!("{}", display::info(&format!("Reader added: {name}")));
                }
                Ok(ReaderEvent::Removed(name)) => {
                    if let Some(session) = sessions.remove(&name) {
                        session.on_disconnected();
                    }
                    println!("{}", display::info(&format!("Reader removed: {name}")));
                }
                Err(_) => break,
            },
        }
    }

    monitor.stop();
    Ok(())
}

fn handle_card_event(
    manager: &PcscDeviceManager,
    sessions: &mut HashMap<String, Arc<Session>>,
    config: &SessionConfig,
    init: bool,
    event: CardEvent,
) {
    match event {
        CardEvent::Inserted { reader, .. } => {
            let session = Arc::clone(sessions.entry(reader.clone()).or_insert_with(|| {
                let name = reader.clone();
                Arc::new(
                    Session::new(config.clone()).with_observer(move |event: SessionEvent| {
                        println!("{}", display::session_event(&name, event));
                    }),
                )
            }));

            if let Err(e) = session.connect(&manager.connector(reader.as_str())) {
                warn!(%reader, error = %e, "Failed to connect to card");
                return;
            }
            if init {
                spawn_init(reader, session);
            }
        }
        CardEvent::Removed { reader } => {
            if let Some(session) = sessions.get(&reader) {
                session.on_disconnected();
            }
        }
    }
}

fn spawn_init(reader: String, session: Arc<Session>) {
    let name = reader.clone();
    let spawned = thread::Builder::new()
        .name(format!("init-{reader}"))
        .spawn(move || match session.init() {
            Ok(secrets) => {
                println!(
                    "{}",
                    display::success(&format!("[{name}] Keycard initialized successfully!"))
                );
                println!("{}", display::secrets_box(&secrets));
            }
            Err(KeycardError::AlreadyInitialised) => {
                println!("{}", display::info(&format!("[{name}] Card is already initialized")));
            }
            Err(KeycardError::SessionClosed) => {
                println!(
                    "{}",
                    display::failure(&format!("[{name}] Card removed during initialization"))
                );
            }
            Err(e) => {
                println!("{}", display::failure(&format!("[{name}] Initialization failed: {e}")));
            }
        });

    if let Err(e) = spawned {
        warn!(%reader, error = %e, "Failed to spawn init worker");
    }
}
