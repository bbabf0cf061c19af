//! Watch - the primary public API for the report board.
//!
//! This module ties the extractor, consensus board, alert log, and
//! publish scheduler together behind a single object. Inbound messages,
//! manual commands, and scheduler ticks all go through it, and all board
//! mutation is serialized through one mutex so concurrent paths never
//! observe a half-updated tally.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::alert::AlertLog;
use crate::catalog::{BossId, Catalog, Floor};
use crate::clock::{Clock, SystemClock};
use crate::consensus::{ReportBoard, ResolutionPolicy};
use crate::extract::extract;
use crate::render::BoardStyle;
use crate::scheduler::{PublishConfig, Publisher, PublishWindow, TickOutcome};
use crate::transport::{ChannelId, ChatTransport};

/// Board plus alert log, guarded as a unit: they reset together at
/// rollover and replay touches both.
#[derive(Debug)]
pub struct BoardState {
    pub board: ReportBoard,
    pub alerts: AlertLog,
}

impl BoardState {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            board: ReportBoard::new(policy),
            alerts: AlertLog::new(),
        }
    }
}

/// Errors from manual command entry points. Invalid input never mutates
/// state.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown floor: {0}")]
    UnknownFloor(String),

    #[error("unknown boss: {0}")]
    UnknownBoss(String),
}

/// What a manual floor edit reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The live board message was found and edited.
    LiveUpdated,
    /// Only the in-memory board changed (no live message, or the edit
    /// failed).
    MemoryOnly,
}

/// Configuration for creating a watch.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Channels whose messages feed the extractor.
    pub source_channels: Vec<ChannelId>,
    /// Channel the board and alerts are published to.
    pub target_channel: ChannelId,
    /// Consensus resolution policy.
    pub policy: ResolutionPolicy,
    /// Active publish window, minutes of the hour.
    pub window: PublishWindow,
    /// History replay reach, in minutes.
    pub lookback_minutes: i64,
    /// Display/schedule offset from UTC, in whole hours.
    pub utc_offset_hours: i32,
    /// Mention string prepended to rare-boss alerts.
    pub alert_mention: Option<String>,
    /// Board presentation.
    pub style: BoardStyle,
}

impl WatchConfig {
    pub fn new(source_channel: ChannelId, target_channel: ChannelId) -> Self {
        Self {
            source_channels: vec![source_channel],
            target_channel,
            policy: ResolutionPolicy::PluralityOnSecond,
            window: PublishWindow::default(),
            lookback_minutes: 10,
            utc_offset_hours: 0,
            alert_mention: None,
            style: BoardStyle::infernal_castle(),
        }
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_window(mut self, window: PublishWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_lookback_minutes(mut self, minutes: i64) -> Self {
        self.lookback_minutes = minutes;
        self
    }

    pub fn with_utc_offset_hours(mut self, hours: i32) -> Self {
        self.utc_offset_hours = hours;
        self
    }

    pub fn with_alert_mention(mut self, mention: impl Into<String>) -> Self {
        self.alert_mention = Some(mention.into());
        self
    }

    pub fn with_style(mut self, style: BoardStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_source_channel(mut self, channel: ChannelId) -> Self {
        self.source_channels.push(channel);
        self
    }
}

/// A running report watch.
///
/// This is the main entry point. It manages:
/// - inbound report ingestion (`on_message`)
/// - the publish cycle (`tick`)
/// - the manual command surface (`force_update`, `edit_floor`)
pub struct Watch {
    catalog: Arc<Catalog>,
    transport: Arc<dyn ChatTransport>,
    state: Arc<Mutex<BoardState>>,
    publisher: Mutex<Publisher>,
    source_channels: Vec<ChannelId>,
    target_channel: ChannelId,
    alert_mention: Option<String>,
}

impl Watch {
    /// Create a watch on the system clock.
    pub fn new(transport: Arc<dyn ChatTransport>, catalog: Catalog, config: WatchConfig) -> Self {
        Self::with_clock(transport, catalog, config, Arc::new(SystemClock))
    }

    /// Create a watch with an injected clock (tests drive this).
    pub fn with_clock(
        transport: Arc<dyn ChatTransport>,
        catalog: Catalog,
        config: WatchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let state = Arc::new(Mutex::new(BoardState::new(config.policy)));
        let publisher = Publisher::new(
            transport.clone(),
            clock,
            catalog.clone(),
            config.style.clone(),
            state.clone(),
            PublishConfig {
                target: config.target_channel,
                sources: config.source_channels.clone(),
                window: config.window,
                lookback_minutes: config.lookback_minutes,
                utc_offset_hours: config.utc_offset_hours,
            },
        );
        Self {
            catalog,
            transport,
            state,
            publisher: Mutex::new(publisher),
            source_channels: config.source_channels,
            target_channel: config.target_channel,
            alert_mention: config.alert_mention,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Ingest one inbound message.
    ///
    /// Self-authored messages and messages from non-source channels are
    /// ignored. A failed extraction is dropped silently (expected
    /// chatter). A recorded rare-boss sighting sends the one-shot alert.
    pub async fn on_message(&self, channel: ChannelId, author_is_self: bool, text: &str) {
        if author_is_self || !self.source_channels.contains(&channel) {
            return;
        }

        let Some(sighting) = extract(&self.catalog, text) else {
            debug!(%text, "no sighting extracted");
            return;
        };

        let alert = {
            let mut state = self.state.lock().await;
            state.board.record(sighting.floor, sighting.boss);
            state
                .alerts
                .should_alert(&self.catalog, sighting.floor, sighting.boss)
        };

        let entry = self.catalog.boss(sighting.boss);
        info!(floor = %sighting.floor, boss = %entry.name, "sighting recorded");

        if alert {
            self.send_alert(sighting.floor, sighting.boss).await;
        }
    }

    /// Run one scheduler tick. Failures are logged, never raised.
    pub async fn tick(&self) -> TickOutcome {
        self.publisher.lock().await.tick().await
    }

    /// Manually refresh or recreate the board. True when a publish
    /// happened.
    pub async fn force_update(&self) -> bool {
        self.publisher.lock().await.force_update().await
    }

    /// Manually override one floor's resolved boss, then try to push the
    /// change to the live board message.
    pub async fn edit_floor(
        &self,
        floor_text: &str,
        boss_text: &str,
    ) -> Result<EditOutcome, CommandError> {
        let floor = self
            .catalog
            .parse_floor(floor_text)
            .ok_or_else(|| CommandError::UnknownFloor(floor_text.to_string()))?;
        let boss = self
            .catalog
            .boss_by_alias(boss_text)
            .ok_or_else(|| CommandError::UnknownBoss(boss_text.to_string()))?;

        self.state.lock().await.board.force(floor, boss);
        info!(%floor, boss = %self.catalog.boss(boss).name, "manual floor override");

        if self.publisher.lock().await.refresh_live().await {
            Ok(EditOutcome::LiveUpdated)
        } else {
            Ok(EditOutcome::MemoryOnly)
        }
    }

    /// Currently resolved boss for a floor number, if any.
    pub async fn resolved(&self, floor: Floor) -> Option<BossId> {
        self.state.lock().await.board.resolved(floor)
    }

    async fn send_alert(&self, floor: Floor, boss: BossId) {
        let entry = self.catalog.boss(boss);
        let mut text = format!(
            "🚨 {} **{}** confirmed on Floor {}!",
            entry.glyph, entry.name, floor
        );
        if let Some(mention) = &self.alert_mention {
            text = format!("{mention} {text}");
        }

        if let Err(e) = self.transport.send(self.target_channel, &text).await {
            warn!(error = %e, "rare-boss alert failed to send");
        }
    }
}
