//! The Keycard provisioning command sequence
//!
//! [`CommandSet`] wraps an [`Executor`] and runs SELECT and INIT against it,
//! remembering what SELECT reported so INIT can be encrypted to the card.

use bytes::Bytes;
use cardlink_apdu_core::prelude::Executor;
use rand::TryRngCore;
use rand::rngs::OsRng;
use tracing::{debug, info};

use crate::commands::{InitCommand, InitParams, ParsedSelectOk, SelectCommand};
use crate::constants::KEYCARD_AID;
use crate::secrets::Secrets;
use crate::validation::validate_aid;
use crate::{Error, Result};

/// SELECT and INIT over a single executor
#[derive(Debug)]
pub struct CommandSet<E: Executor> {
    /// Command executor
    executor: E,
    /// Applet instance to select
    aid: Bytes,
    /// Outcome of the last successful SELECT
    selected: Option<ParsedSelectOk>,
}

impl<E: Executor> CommandSet<E> {
    /// Create a command set selecting the default Keycard instance
    pub const fn new(executor: E) -> Self {
        Self {
            executor,
            aid: Bytes::from_static(KEYCARD_AID),
            selected: None,
        }
    }

    /// Select a different applet instance
    pub fn with_aid(mut self, aid: impl Into<Bytes>) -> Self {
        self.aid = aid.into();
        self
    }

    /// Get a reference to the executor
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Give back the executor
    pub fn into_executor(self) -> E {
        self.executor
    }

    /// What the last successful SELECT reported
    pub const fn selected(&self) -> Option<&ParsedSelectOk> {
        self.selected.as_ref()
    }

    /// Select the applet and record its state
    ///
    /// An AID outside 5 to 16 bytes is rejected before anything is sent.
    pub fn select(&mut self) -> Result<ParsedSelectOk> {
        self.selected = None;
        validate_aid(&self.aid)?;

        let cmd = SelectCommand::with_aid(self.aid.clone());
        let parsed = self.executor.execute(&cmd)?;
        debug!(
            aid = %hex::encode(&self.aid),
            initialized = parsed.is_initialized(),
            "Applet selected"
        );

        self.selected = Some(parsed.clone());
        Ok(parsed)
    }

    /// The key INIT must be encrypted to
    ///
    /// Fails with [`Error::AlreadyInitialised`] if SELECT reported an initialized
    /// card and with [`Error::InvalidData`] if there is no key to use.
    pub fn init_public_key(&self) -> Result<&k256::PublicKey> {
        match &self.selected {
            Some(ParsedSelectOk::Initialized(_)) => Err(Error::AlreadyInitialised),
            Some(ParsedSelectOk::Uninitialized(Some(key))) => Ok(key),
            Some(ParsedSelectOk::Uninitialized(None)) | None => Err(Error::InvalidData(
                "Card public key is required for initialization",
            )),
        }
    }

    /// Provision `secrets` into the selected card
    pub fn init(&mut self, secrets: &Secrets, params: &InitParams) -> Result<()> {
        self.init_with_rng(secrets, params, &mut OsRng)
    }

    /// Provision `secrets`, drawing the ephemeral host key and IV from `rng`
    pub fn init_with_rng<R: TryRngCore>(
        &mut self,
        secrets: &Secrets,
        params: &InitParams,
        rng: &mut R,
    ) -> Result<()> {
        let card_public_key = *self.init_public_key()?;

        let payload = secrets.to_init_payload(params);
        let cmd = InitCommand::with_card_pubkey(&card_public_key, &payload, rng)?;
        self.executor.execute(&cmd)?;

        // The card now answers SELECT with its application info
        self.selected = None;
        info!(version = %params.version, "Card initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_apdu_core::prelude::*;
    use crate::Error;
    use cardlink_apdu_core::transport::mock::MockTransport;
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    fn uninitialized_select(key: &k256::PublicKey) -> Bytes {
        let mut response = vec![0x80, 0x41];
        response.extend_from_slice(key.to_encoded_point(false).as_bytes());
        response.extend_from_slice(&[0x90, 0x00]);
        response.into()
    }

    fn secrets() -> Secrets {
        Secrets::new("123456", "123456789012", "KeycardTest").unwrap()
    }

    #[test]
    fn test_select_then_init() {
        let card = k256::SecretKey::random(&mut rand_v8::thread_rng());
        let transport = MockTransport::new([
            uninitialized_select(&card.public_key()),
            Bytes::from_static(&[0x90, 0x00]),
        ]);
        let log = transport.command_log();
        let mut commands = CommandSet::new(CardExecutor::new(transport));

        commands.select().unwrap();
        assert_eq!(commands.init_public_key().unwrap(), &card.public_key());
        commands.init(&secrets(), &InitParams::default()).unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(&log[1][..2], &[0x80, 0xFE]);
        assert!(commands.selected().is_none());
    }

    #[test]
    fn test_init_without_select() {
        let mut commands = CommandSet::new(CardExecutor::new(MockTransport::with_success()));
        assert!(matches!(
            commands.init(&secrets(), &InitParams::default()),
            Err(Error::InvalidData(_))
        ));
        assert!(commands.executor().transport().commands().is_empty());
    }

    #[test]
    fn test_init_missing_public_key() {
        let transport = MockTransport::new([Bytes::from_static(&[0x80, 0x00, 0x90, 0x00])]);
        let mut commands = CommandSet::new(CardExecutor::new(transport));
        commands.select().unwrap();

        assert!(matches!(
            commands.init(&secrets(), &InitParams::default()),
            Err(Error::InvalidData(_))
        ));
        assert_eq!(commands.executor().transport().commands().len(), 1);
    }

    #[test]
    fn test_select_failure() {
        let transport = MockTransport::new([Bytes::from_static(&[0x6A, 0x82])]);
        let mut commands = CommandSet::new(CardExecutor::new(transport));

        let err = commands.select().unwrap_err();
        assert!(matches!(err, Error::CardProtocol { command: "SELECT", .. }));
        assert!(commands.selected().is_none());
    }

    #[test]
    fn test_transport_error_propagates_unchanged() {
        let mut transport = MockTransport::new([]);
        transport.push_error(TransportError::Timeout);
        let mut commands = CommandSet::new(CardExecutor::new(transport));

        assert!(matches!(
            commands.select(),
            Err(Error::Transport(TransportError::Timeout))
        ));
    }

    #[test]
    fn test_oversized_aid_is_not_sent() {
        let transport = MockTransport::with_success();
        let log = transport.command_log();
        let mut commands =
            CommandSet::new(CardExecutor::new(transport)).with_aid(vec![0xA0; 300]);

        assert!(matches!(commands.select(), Err(Error::Validation(_))));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_custom_aid() {
        let transport = MockTransport::new([Bytes::from_static(&[0x80, 0x00, 0x90, 0x00])]);
        let log = transport.command_log();
        let aid = crate::keycard_instance_aid(2).unwrap();
        let mut commands = CommandSet::new(CardExecutor::new(transport)).with_aid(aid);
        commands.select().unwrap();

        assert_eq!(
            log.lock()[0][5..13],
            [0xA0, 0x00, 0x00, 0x08, 0x04, 0x00, 0x01, 0x02]
        );
    }
}
