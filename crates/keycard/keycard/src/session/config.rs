use bytes::Bytes;

use crate::AppletVersion;
use crate::commands::InitParams;
use crate::constants::{DEFAULT_MAX_PIN_ATTEMPTS, DEFAULT_MAX_PUK_ATTEMPTS, KEYCARD_AID};
use crate::validation::ValidationResult;

/// Configuration for a [`SessionManager`](super::SessionManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Applet instance to select
    pub aid: Bytes,
    /// INIT payload layout
    pub applet_version: AppletVersion,
    /// PIN retry counter written by v3.1 INIT
    pub max_pin_attempts: u8,
    /// PUK retry counter written by v3.1 INIT
    pub max_puk_attempts: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            aid: Bytes::from_static(KEYCARD_AID),
            applet_version: AppletVersion::Legacy,
            max_pin_attempts: DEFAULT_MAX_PIN_ATTEMPTS,
            max_puk_attempts: DEFAULT_MAX_PUK_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    /// Select a different applet instance
    pub fn with_aid(mut self, aid: impl Into<Bytes>) -> Self {
        self.aid = aid.into();
        self
    }

    /// Set the applet version
    pub const fn with_applet_version(mut self, version: AppletVersion) -> Self {
        self.applet_version = version;
        self
    }

    /// Set the PIN retry counter
    pub const fn with_max_pin_attempts(mut self, attempts: u8) -> Self {
        self.max_pin_attempts = attempts;
        self
    }

    /// Set the PUK retry counter
    pub const fn with_max_puk_attempts(mut self, attempts: u8) -> Self {
        self.max_puk_attempts = attempts;
        self
    }

    /// INIT parameters for this configuration
    ///
    /// Retry counters are only checked when the v3.1 layout will carry them.
    pub fn init_params(&self) -> ValidationResult<InitParams> {
        match self.applet_version {
            AppletVersion::Legacy => Ok(InitParams::legacy()),
            AppletVersion::V3_1 => InitParams::v3_1(self.max_pin_attempts, self.max_puk_attempts),
        }
    }
}
