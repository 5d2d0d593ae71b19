//! Display utilities for the cardlink CLI

use cardlink_keycard::{Secrets, SessionEvent};
use colored::Colorize;

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format an info message
pub fn info(message: &str) -> String {
    format!("ℹ️  {}", message.blue())
}

/// Format a failure message
pub fn failure(message: &str) -> String {
    format!("❌ {}", message.red().bold())
}

/// Format a session notification for a reader
pub fn session_event(reader: &str, event: SessionEvent) -> String {
    let label = match event {
        SessionEvent::Connected => event.to_string().green(),
        SessionEvent::Disconnected => event.to_string().yellow(),
    };
    format!("[{}] {}", reader.bold(), label)
}

/// Format freshly provisioned credentials, shown exactly once
pub fn secrets_box(secrets: &Secrets) -> String {
    let mut result = format!(
        "{}\n{}",
        warning("SAVE THIS INFORMATION SECURELY - IT WON'T BE SHOWN AGAIN!"),
        "Security Credentials".bold().underline()
    );

    let mut items = vec![
        ("PIN", secrets.pin()),
        ("PUK", secrets.puk()),
        ("Pairing password", secrets.pairing_password()),
    ];
    if let Some(duress) = secrets.duress_pin() {
        items.push(("Duress PIN", duress));
    }

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}
