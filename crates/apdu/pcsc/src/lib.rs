//! PC/SC transport implementation for APDU operations
//!
//! This crate provides an implementation of the `CardTransport` trait from
//! `cardlink-apdu-core` using the PC/SC API for communication with smart cards,
//! plus a monitor that reports card insertion and removal.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cardlink_apdu_core::prelude::*;
//! use cardlink_apdu_pcsc::PcscDeviceManager;
//!
//! let manager = PcscDeviceManager::new()?;
//! let reader = manager.find_reader_with_card()?;
//! println!("Connecting to reader: {}", reader.name());
//!
//! let transport = manager.open_reader(reader.name())?;
//! let mut executor = CardExecutor::new(transport);
//!
//! let aid = hex::decode("A0000008040001")?;
//! let select = Command::new_with_data(0x00, 0xA4, 0x04, 0x00, aid).with_le(0);
//! let response = executor.execute(&select)?;
//! println!("Status: {}", response.status());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
pub mod event;
mod manager;
mod monitor;
mod reader;
mod transport;

pub use config::{PcscConfig, ShareMode};
pub use error::PcscError;
pub use event::{CardEvent, ReaderEvent};
pub use manager::{PcscConnector, PcscDeviceManager};
pub use monitor::PcscMonitor;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols, Status};
