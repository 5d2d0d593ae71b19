//! Card session management
//!
//! A [`SessionManager`] owns the channel to at most one connected card and runs
//! the provisioning sequence (SELECT, generate secrets, INIT) against it.
//!
//! The transport side reports connection changes through
//! [`SessionManager::on_connected`] and [`SessionManager::on_disconnected`],
//! which may arrive on any thread and at any time, including while
//! [`SessionManager::init`] is running. The channel is moved out of the manager
//! for the duration of `init`, so a disconnect never waits on card I/O: it closes
//! the current link and the in-flight sequence notices within one exchange.

mod config;
mod link;
mod observer;

pub use config::SessionConfig;
pub use link::GuardedTransport;
pub use observer::{ChannelObserver, SessionEvent, SessionObserver};

use std::fmt;
use std::sync::Arc;

use cardlink_apdu_core::{CardConnector, CardExecutor, CardTransport};
use derive_more::Display;
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info, warn};

use crate::command_set::CommandSet;
use crate::commands::InitParams;
use crate::secrets::{RandomSecrets, Secrets, SecretsGenerator};
use crate::validation::validate_aid;
use crate::{Error, Result};
use link::Link;

/// Lifecycle of a card session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    /// No card attached
    Disconnected,
    /// A card is attached and idle
    Connected,
    /// The provisioning sequence is running
    Initializing,
    /// The last attempt provisioned the card
    Initialized,
    /// The last attempt failed; reconnect to try again
    Failed,
}

struct Inner<T> {
    state: SessionState,
    link: Option<Arc<Link>>,
    /// `None` while `init` has the channel checked out
    channel: Option<T>,
}

/// Drives provisioning for one card at a time
pub struct SessionManager<T: CardTransport, G = RandomSecrets> {
    config: SessionConfig,
    inner: Mutex<Inner<T>>,
    generator: Mutex<G>,
    observer: Option<Arc<dyn SessionObserver>>,
    /// Held across a state change and its notification so observers see changes
    /// in the order they were made. Reentrant so an observer may call back in.
    events: ReentrantMutex<()>,
}

impl<T: CardTransport, G> fmt::Debug for SessionManager<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("state", &self.inner.lock().state)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport> SessionManager<T> {
    /// Create a session manager generating secrets from the OS random source
    pub fn new(config: SessionConfig) -> Self {
        Self::with_generator(config, RandomSecrets::default())
    }
}

impl<T: CardTransport, G: SecretsGenerator> SessionManager<T, G> {
    /// Create a session manager with a custom secrets generator
    pub fn with_generator(config: SessionConfig, generator: G) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Disconnected,
                link: None,
                channel: None,
            }),
            generator: Mutex::new(generator),
            observer: None,
            events: ReentrantMutex::new(()),
        }
    }

    /// Notify `observer` of connects and disconnects
    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// The session configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Open a channel through `connector` and attach it
    pub fn connect<C>(&self, connector: &C) -> Result<()>
    where
        C: CardConnector<Transport = T>,
    {
        let channel = connector.open()?;
        self.on_connected(channel);
        Ok(())
    }

    /// Attach a newly opened channel
    ///
    /// A previous channel still attached is treated as disconnected first.
    pub fn on_connected(&self, channel: T) {
        let _events = self.events.lock();
        let link = Link::new();
        let replaced = {
            let mut inner = self.inner.lock();
            let previous = Self::detach(&mut inner);
            inner.link = Some(Arc::clone(&link));
            inner.channel = Some(channel);
            inner.state = SessionState::Connected;
            previous
        };

        if replaced {
            warn!("Connected without a prior disconnect, previous channel dropped");
            self.notify(SessionEvent::Disconnected);
        }
        debug!(link = link.id(), "Card connected");
        self.notify(SessionEvent::Connected);
    }

    /// Detach the current channel
    ///
    /// Safe to call in any state; a second call without an intervening connect
    /// does nothing.
    pub fn on_disconnected(&self) {
        let _events = self.events.lock();
        let detached = {
            let mut inner = self.inner.lock();
            let detached = Self::detach(&mut inner);
            inner.state = SessionState::Disconnected;
            detached
        };

        if detached {
            debug!("Card disconnected");
            self.notify(SessionEvent::Disconnected);
        }
    }

    /// Close the channel from the caller's side
    ///
    /// This is a disconnect: any running `init` fails with [`Error::SessionClosed`].
    pub fn close(&self) {
        self.on_disconnected();
    }

    /// Provision the connected card and hand back its new secrets
    ///
    /// Valid only in [`SessionState::Connected`]. A concurrent call while the
    /// sequence runs fails with [`Error::SessionBusy`] without touching the card.
    ///
    /// A disconnect, or the channel itself reporting [`TransportError::Closed`]
    /// or [`TransportError::Cancelled`], fails the attempt with
    /// [`Error::SessionClosed`] and leaves the session `Disconnected`. The one
    /// exception is a disconnect that lands after the card acknowledged INIT but
    /// before this call returns: the card is provisioned by then, so the secrets
    /// are still returned.
    ///
    /// [`TransportError::Closed`]: cardlink_apdu_core::TransportError::Closed
    /// [`TransportError::Cancelled`]: cardlink_apdu_core::TransportError::Cancelled
    pub fn init(&self) -> Result<Secrets> {
        validate_aid(&self.config.aid)?;
        let params = self.config.init_params()?;

        let (channel, link) = {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Connected => {}
                SessionState::Initializing => return Err(Error::SessionBusy),
                state => return Err(Error::InvalidSessionState(state)),
            }
            let (Some(channel), Some(link)) = (inner.channel.take(), inner.link.clone()) else {
                return Err(Error::InvalidSessionState(inner.state));
            };
            inner.state = SessionState::Initializing;
            (channel, link)
        };
        debug!(link = link.id(), "Initialization started");

        let transport = GuardedTransport::new(channel, Arc::clone(&link));
        let mut commands =
            CommandSet::new(CardExecutor::new(transport)).with_aid(self.config.aid.clone());
        let result = self.run(&mut commands, &params);
        let mut channel = commands.into_executor().into_transport().into_inner();

        let _events = self.events.lock();
        let mut inner = self.inner.lock();
        if !link.is_closed() && result.as_ref().is_err_and(Error::is_link_lost) {
            // The channel saw the card go before any disconnect notification did
            Self::detach(&mut inner);
            inner.state = SessionState::Disconnected;
            drop(inner);
            channel.close();
            if let Err(e) = &result {
                warn!(
                    link = link.id(),
                    error = %e,
                    "Channel lost during initialization, it may be partially provisioned"
                );
            }
            self.notify(SessionEvent::Disconnected);
            return Err(Error::SessionClosed);
        }
        if link.is_closed() {
            drop(inner);
            channel.close();
            return match result {
                Ok(secrets) => {
                    // Every exchange completed before the disconnect landed
                    warn!(link = link.id(), "Card disconnected right after INIT");
                    Ok(secrets)
                }
                Err(e) => {
                    warn!(
                        link = link.id(),
                        error = %e,
                        "Card disconnected during initialization, it may be partially provisioned"
                    );
                    Err(Error::SessionClosed)
                }
            };
        }

        inner.channel = Some(channel);
        match result {
            Ok(secrets) => {
                inner.state = SessionState::Initialized;
                info!(link = link.id(), "Card provisioned");
                Ok(secrets)
            }
            Err(e) => {
                inner.state = SessionState::Failed;
                warn!(link = link.id(), error = %e, "Initialization failed");
                Err(e)
            }
        }
    }

    fn run<E>(&self, commands: &mut CommandSet<E>, params: &InitParams) -> Result<Secrets>
    where
        E: cardlink_apdu_core::Executor,
    {
        commands.select()?;
        // Refuse before any secrets exist
        commands.init_public_key()?;

        let secrets = self.generator.lock().generate()?;
        commands.init(&secrets, params)?;
        Ok(secrets)
    }

    /// Close and drop the attached link and channel, returning whether there was one
    fn detach(inner: &mut Inner<T>) -> bool {
        let Some(link) = inner.link.take() else {
            return false;
        };
        link.close();
        if let Some(mut channel) = inner.channel.take() {
            channel.close();
        }
        true
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(event);
        }
    }
}
