use anyhow::{Context, Result, anyhow, bail};
use cardlink_apdu_pcsc::{PcscDeviceManager, PcscReader};

/// Find a reader with a specific name
pub fn find_reader_by_name(manager: &PcscDeviceManager, reader_name: &str) -> Result<PcscReader> {
    manager
        .list_readers()?
        .into_iter()
        .find(|r| r.name() == reader_name)
        .ok_or_else(|| anyhow!("Reader '{reader_name}' not found"))
}

/// The reader to use: the named one, or the first holding a card
pub fn resolve_reader(manager: &PcscDeviceManager, reader_name: Option<&str>) -> Result<PcscReader> {
    match reader_name {
        Some(name) => find_reader_by_name(manager, name),
        None => manager
            .find_reader_with_card()
            .context("No card found in any reader"),
    }
}

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> Result<()> {
    let readers = match manager.list_readers() {
        Ok(readers) => readers,
        Err(cardlink_apdu_pcsc::PcscError::NoReadersAvailable) => Vec::new(),
        Err(e) => bail!(e),
    };

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = match reader.atr() {
            Some(atr) if reader.has_card() => format!("card present, ATR {}", hex::encode_upper(atr)),
            _ if reader.has_card() => "card present".to_string(),
            _ => "no card".to_string(),
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}
