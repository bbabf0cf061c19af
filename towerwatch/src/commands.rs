//! The `!` command shell.
//!
//! Thin dispatch over the core's manual entry points plus a few
//! diagnostics. Replies go back to the channel the command came from;
//! reply failures are logged and dropped.

use std::time::Instant;

use tracing::warn;

use towerwatch_core::{ChannelId, ChatTransport, EditOutcome, Watch};

/// Handle one command line (leading `!` already stripped).
pub async fn dispatch(
    watch: &Watch,
    transport: &dyn ChatTransport,
    channel: ChannelId,
    line: &str,
    started: Instant,
) {
    let mut parts = line.split_whitespace();
    let reply = match parts.next() {
        Some("force_update") => {
            if watch.force_update().await {
                "✅ Report updated manually!".to_string()
            } else {
                "⚠️ Update failed, check the logs.".to_string()
            }
        }
        Some("editfloor") => match (parts.next(), parts.next()) {
            (Some(floor), Some(boss)) => match watch.edit_floor(floor, boss).await {
                Ok(EditOutcome::LiveUpdated) => {
                    format!("✅ Floor {floor} updated on the live board.")
                }
                Ok(EditOutcome::MemoryOnly) => {
                    format!("☑️ Floor {floor} updated; no live board to edit.")
                }
                Err(e) => format!("❌ {e}"),
            },
            _ => "Usage: !editfloor <floor> <boss>".to_string(),
        },
        Some("botuptime") => format_uptime(started.elapsed().as_secs()),
        Some("test") => "✅ Bot is alive.".to_string(),
        Some("permissions") => {
            "I need: read messages, send messages, manage my own messages.".to_string()
        }
        _ => return, // unknown commands are someone else's business
    };

    if let Err(e) = transport.send(channel, &reply).await {
        warn!(error = %e, "command reply failed to send");
    }
}

fn format_uptime(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("⏱️ Uptime: {hours}h {minutes}m {seconds}s")
}
