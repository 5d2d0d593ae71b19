pub mod init;
pub use init::*;
pub mod select;
pub use select::*;

use cardlink_apdu_core::{ApduResponse, Response};
use tracing::debug;

use crate::{Error, Result};

/// Treat any status other than `90 00` as fatal for `command`
pub(crate) fn check_ok(command: &'static str, response: &Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    debug!(command, %status, "Card rejected command");
    Err(Error::CardProtocol { command, status })
}
