//! Towerwatch bot binary.
//!
//! Wires the core watch to the Discord transport: a tick task drives the
//! publish cycle, and a polling loop pulls new source-channel messages
//! for report ingestion and `!` command dispatch. Commands are accepted
//! in the source channel only; no other channels are watched.
//!
//! Configuration comes from the environment (a `.env` file is honored):
//!
//! ```bash
//! DISCORD_BOT_TOKEN=...       # required
//! SOURCE_CHANNEL_ID=...       # required, where observers report
//! TARGET_CHANNEL_ID=...       # required, where the board is posted
//! PING_ROLE_ID=...            # optional, mentioned atop the board
//! ALERT_ROLE_ID=...           # optional, mentioned on rare-boss alerts
//! POLICY=threshold            # optional: plurality (default) | threshold
//! THRESHOLD=3                 # optional, used with POLICY=threshold
//! UTC_OFFSET_HOURS=2          # optional, display/schedule offset
//! ```

mod commands;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use towerwatch_core::{
    BoardStyle, Catalog, ChannelId, ChatTransport, DiscordTransport, MessageRef, ResolutionPolicy,
    Watch, WatchConfig,
};

const TICK_INTERVAL: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_secs(3);
const POLL_FETCH_LIMIT: usize = 50;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = match discord::Discord::from_env() {
        Ok(client) => client,
        Err(_) => {
            eprintln!("Error: DISCORD_BOT_TOKEN environment variable not set.");
            eprintln!("Please set it in .env file or with: export DISCORD_BOT_TOKEN=your_token");
            std::process::exit(1);
        }
    };

    let source = ChannelId(require_u64("SOURCE_CHANNEL_ID")?);
    let target = ChannelId(require_u64("TARGET_CHANNEL_ID")?);

    let mut style = BoardStyle::infernal_castle();
    if let Some(role) = optional_u64("PING_ROLE_ID") {
        style = style.with_mention(format!("<@&{role}>"));
    }

    let mut config = WatchConfig::new(source, target)
        .with_policy(policy_from_env())
        .with_utc_offset_hours(optional_i32("UTC_OFFSET_HOURS").unwrap_or(0))
        .with_style(style);
    if let Some(role) = optional_u64("ALERT_ROLE_ID") {
        config = config.with_alert_mention(format!("<@&{role}>"));
    }

    let transport: Arc<dyn ChatTransport> =
        Arc::new(DiscordTransport::connect(client).await?);
    let watch = Arc::new(Watch::new(
        transport.clone(),
        Catalog::infernal_castle(),
        config,
    ));
    let started = Instant::now();

    info!(source = source.0, target = target.0, "towerwatch starting");

    // Single tick task; each tick is awaited to completion so a slow
    // transport call can never overlap the next tick.
    let ticker = watch.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            ticker.tick().await;
        }
    });

    poll_loop(watch, transport, source, started).await;
    Ok(())
}

/// Pull new messages from the source channel and route them: commands to
/// the dispatcher, everything else to the extractor.
async fn poll_loop(
    watch: Arc<Watch>,
    transport: Arc<dyn ChatTransport>,
    source: ChannelId,
    started: Instant,
) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_seen: Option<MessageRef> = None;

    loop {
        interval.tick().await;

        let history = match transport.history(source, POLL_FETCH_LIMIT).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "source channel poll failed");
                continue;
            }
        };

        // First successful poll only records the high-water mark:
        // backlog ingestion is recovery's job, not the live loop's.
        let Some(mark) = last_seen else {
            last_seen = history.first().map(|m| m.id);
            continue;
        };

        let mut fresh: Vec<_> = history.into_iter().filter(|m| m.id > mark).collect();
        fresh.sort_by_key(|m| m.id);

        for message in fresh {
            last_seen = Some(message.id);
            if message.author_is_self {
                continue;
            }
            if let Some(line) = message.content.strip_prefix('!') {
                commands::dispatch(&watch, transport.as_ref(), source, line, started).await;
            } else {
                watch.on_message(source, false, &message.content).await;
            }
        }
    }
}

fn require_u64(name: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let value = std::env::var(name).map_err(|_| format!("{name} environment variable not set"))?;
    Ok(value
        .trim()
        .parse()
        .map_err(|_| format!("{name} is not a valid id: {value}"))?)
}

fn optional_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn optional_i32(name: &str) -> Option<i32> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn policy_from_env() -> ResolutionPolicy {
    match std::env::var("POLICY").as_deref() {
        Ok("threshold") => {
            let threshold = optional_u64("THRESHOLD").map_or(3, |t| t as u32);
            ResolutionPolicy::Threshold(threshold)
        }
        _ => ResolutionPolicy::PluralityOnSecond,
    }
}
