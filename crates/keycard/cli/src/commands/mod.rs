//! Subcommand implementations

mod card;
mod watch;

pub use card::{SecretArgs, init_command, select_command};
pub use watch::watch_command;

pub use crate::utils::reader::list_readers;
