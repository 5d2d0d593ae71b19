//! Commands for a single card in a single reader

use anyhow::{Context, Result, bail};
use cardlink_apdu_core::CardExecutor;
use cardlink_apdu_pcsc::PcscTransport;
use cardlink_keycard::{CommandSet, ParsedSelectOk, RandomSecrets, Secrets, SecretsGenerator};
use clap::Args;
use tracing::{debug, info};

use crate::utils::{InitArgs, display};

/// Caller-chosen credentials; anything left out is generated
#[derive(Args, Debug, Clone)]
pub struct SecretArgs {
    /// PIN (6 digits, default is random)
    #[arg(long)]
    pub pin: Option<String>,

    /// PUK (12 digits, default is random)
    #[arg(long)]
    pub puk: Option<String>,

    /// Pairing password (default is random)
    #[arg(long)]
    pub pairing_password: Option<String>,

    /// Duress PIN for v3.1 applets (default is the first six PUK digits)
    #[arg(long)]
    pub duress_pin: Option<String>,
}

impl SecretArgs {
    fn resolve(&self) -> Result<Secrets> {
        let generated = RandomSecrets::default()
            .generate()
            .context("Failed to generate secrets")?;
        if self.pin.is_none() && self.puk.is_none() && self.pairing_password.is_none() {
            debug!("Generating random secrets");
            return with_duress(generated, self.duress_pin.as_deref());
        }

        debug!("Using provided secrets");
        let secrets = Secrets::new(
            self.pin.as_deref().unwrap_or(generated.pin()),
            self.puk.as_deref().unwrap_or(generated.puk()),
            self.pairing_password
                .as_deref()
                .unwrap_or(generated.pairing_password()),
        )?;
        with_duress(secrets, self.duress_pin.as_deref())
    }
}

fn with_duress(secrets: Secrets, duress_pin: Option<&str>) -> Result<Secrets> {
    match duress_pin {
        Some(pin) => Ok(secrets.with_duress_pin(pin)?),
        None => Ok(secrets),
    }
}

/// Select the Keycard application and display its state
pub fn select_command(transport: PcscTransport) -> Result<()> {
    let mut commands = CommandSet::new(CardExecutor::new(transport));
    let selected = commands.select()?;

    info!("Keycard applet selected successfully.");
    println!("{selected}");
    Ok(())
}

/// Initialize an uninitialized Keycard
pub fn init_command(transport: PcscTransport, secrets: &SecretArgs, init: &InitArgs) -> Result<()> {
    let params = init.session_config().init_params()?;
    let mut commands = CommandSet::new(CardExecutor::new(transport));

    if let ParsedSelectOk::Initialized(info) = commands.select()? {
        println!("{info}");
        bail!("Card is already initialized");
    }
    // Fail on a card without a key before any secrets are shown
    commands.init_public_key()?;

    let secrets = secrets.resolve()?;
    commands.init(&secrets, &params)?;

    println!("{}", display::success("Keycard initialized successfully!"));
    println!("{}", display::secrets_box(&secrets));
    Ok(())
}
