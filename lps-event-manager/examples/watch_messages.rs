//! Watch a VK account's long-poll stream and print every event.
//!
//! Run with:
//!   VK_ACCESS_TOKEN=... LPS_LOG_MODE=development \
//!   cargo run -p vk-lps-event-manager --example watch_messages
//!
//! The example stops after ten minutes without any event.

use std::time::Duration;

use lps_event_manager::prelude::*;
use lps_stream::logging::init_logging_from_env;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let token = match std::env::var("VK_ACCESS_TOKEN") {
        Ok(token) => token,
        Err(_) => {
            eprintln!("Set VK_ACCESS_TOKEN to a user access token with messages scope.");
            return Ok(());
        }
    };

    let manager = LongPollManager::new(ApiConfig::new(token))?;
    manager.start()?;
    println!("Watching long-poll events, phase: {:?}", manager.phase());

    for event in manager.iter().timeout_iter(Duration::from_secs(600)) {
        match event {
            LongPollEvent::MessageChanged => println!("messages changed"),
            LongPollEvent::PresenceChanged { .. } => {
                println!(
                    "presence changed for users {}",
                    event.joined_user_ids().unwrap_or_default()
                );
            }
            LongPollEvent::HistoryReset => println!("history reset, reload everything"),
        }
    }

    match manager.stop() {
        Ok(reason) => println!("stopped: {reason}"),
        Err(e) => println!("loop had already ended: {e}"),
    }
    manager.shutdown()?;
    Ok(())
}
