//! Device manager for PC/SC operations

use std::fmt;

use cardlink_apdu_core::{CardConnector, TransportError};
use pcsc::{Context, Scope};
use tracing::debug;

use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::monitor::PcscMonitor;
use crate::reader::PcscReader;
use crate::transport::PcscTransport;

/// Manager for PC/SC device operations
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
    /// Configuration handed to every transport and monitor
    config: PcscConfig,
}

impl fmt::Debug for PcscDeviceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscDeviceManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        Self::with_config(PcscConfig::default())
    }

    /// Create a new PC/SC device manager with custom configuration
    pub fn with_config(config: PcscConfig) -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context, config })
    }

    /// The configuration in use
    pub const fn config(&self) -> &PcscConfig {
        &self.config
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = match self.context.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if readers.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut result = Vec::with_capacity(readers.len());
        for reader_name in readers {
            let mut reader_states = [pcsc::ReaderState::new(
                reader_name.as_c_str(),
                pcsc::State::UNAWARE,
            )];

            match self.context.get_status_change(None, &mut reader_states) {
                Ok(()) => result.push(PcscReader::from_reader_state(&reader_states[0])),
                Err(e) => {
                    debug!(error = %e, "Could not read reader state, assuming empty");
                    result.push(PcscReader::new(
                        reader_name.to_string_lossy().into_owned(),
                        false,
                        None,
                    ));
                }
            }
        }

        Ok(result)
    }

    /// Find the first reader that currently holds a card
    pub fn find_reader_with_card(&self) -> Result<PcscReader, PcscError> {
        self.list_readers()?
            .into_iter()
            .find(PcscReader::has_card)
            .ok_or_else(|| PcscError::NoCard("any reader".to_string()))
    }

    /// Open a connection to a specific reader
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTransport, PcscError> {
        self.open_reader_with_config(reader_name, self.config.clone())
    }

    /// Open a connection to a specific reader with custom configuration
    pub fn open_reader_with_config(
        &self,
        reader_name: &str,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        PcscTransport::connect(self.context.clone(), reader_name, config)
    }

    /// A connector that opens channels to the card in `reader_name`
    pub fn connector(&self, reader_name: impl Into<String>) -> PcscConnector {
        PcscConnector {
            context: self.context.clone(),
            reader_name: reader_name.into(),
            config: self.config.clone(),
        }
    }

    /// Create a monitor for PC/SC events
    pub fn monitor(&self) -> PcscMonitor {
        PcscMonitor::new(self.context.clone(), self.config.poll_timeout)
    }
}

/// Opens PC/SC channels to the card in one reader
#[derive(Clone)]
pub struct PcscConnector {
    context: Context,
    reader_name: String,
    config: PcscConfig,
}

impl fmt::Debug for PcscConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscConnector")
            .field("reader_name", &self.reader_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PcscConnector {
    /// The reader this connector targets
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }
}

impl CardConnector for PcscConnector {
    type Transport = PcscTransport;

    fn open(&self) -> Result<PcscTransport, TransportError> {
        PcscTransport::connect(self.context.clone(), &self.reader_name, self.config.clone())
            .map_err(Into::into)
    }
}
