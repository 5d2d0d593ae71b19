//! Utility functions and types for the cardlink CLI

pub mod display;
pub mod reader;

use cardlink_keycard::{AppletVersion, DEFAULT_MAX_PIN_ATTEMPTS, DEFAULT_MAX_PUK_ATTEMPTS, SessionConfig};
use clap::Args;

/// INIT options shared by `init` and `watch --init`
#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Applet payload layout
    #[arg(long, value_enum, default_value_t = AppletVersion::Legacy)]
    pub applet_version: AppletVersion,

    /// PIN retry counter (v3.1 only)
    #[arg(long, default_value_t = DEFAULT_MAX_PIN_ATTEMPTS)]
    pub max_pin_attempts: u8,

    /// PUK retry counter (v3.1 only)
    #[arg(long, default_value_t = DEFAULT_MAX_PUK_ATTEMPTS)]
    pub max_puk_attempts: u8,
}

impl InitArgs {
    /// Session configuration for these options
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_applet_version(self.applet_version)
            .with_max_pin_attempts(self.max_pin_attempts)
            .with_max_puk_attempts(self.max_puk_attempts)
    }
}
