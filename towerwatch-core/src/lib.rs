//! Sighting-report consensus engine with a scheduled status board.
//!
//! This crate provides:
//! - Extraction of (floor, boss) sightings from free-text reports
//! - Per-floor vote tallies with pluggable resolution policies
//! - A wall-clock publish scheduler that posts one board message per
//!   hour and edits it in place
//! - State recovery by replaying recent channel history
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use towerwatch_core::{
//!     Catalog, ChannelId, DiscordTransport, Watch, WatchConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = discord::Discord::from_env()?;
//!     let transport = Arc::new(DiscordTransport::connect(client).await?);
//!
//!     let config = WatchConfig::new(ChannelId(1), ChannelId(2))
//!         .with_utc_offset_hours(2);
//!     let watch = Watch::new(transport, Catalog::infernal_castle(), config);
//!
//!     watch.on_message(ChannelId(1), false, "F70 Frioo").await;
//!     watch.tick().await;
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod catalog;
pub mod clock;
pub mod consensus;
pub mod extract;
pub mod recovery;
pub mod render;
pub mod scheduler;
pub mod service;
pub mod testing;
pub mod transport;

// Primary public API
pub use catalog::{BossEntry, BossId, Catalog, Floor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use consensus::{FloorTally, ReportBoard, ResolutionPolicy};
pub use extract::{extract, Sighting};
pub use render::{render_report, BoardStyle};
pub use scheduler::{PublishState, PublishWindow, TickOutcome};
pub use service::{BoardState, CommandError, EditOutcome, Watch, WatchConfig};
pub use transport::{
    ChannelId, ChatMessage, ChatTransport, DiscordTransport, MessageRef, TransportError,
};
