//! The wall-clock publish scheduler.
//!
//! A `Publisher` owns the reference to the currently-live board message
//! and decides, tick by tick, whether to create a new one, edit the
//! existing one in place, or do nothing. Ticks are expected every few
//! seconds from a single driving task; sub-second precision is never
//! relied on.
//!
//! State machine over minute-of-hour:
//! - `Idle`: outside the active window.
//! - `AwaitingCycleStart`: window entered, no message created for this
//!   cycle yet. The next tick runs history recovery and posts a fresh
//!   board.
//! - `Live`: a message belonging to the current hour exists; ticks
//!   re-render and edit it. A missing edit target is recreated in the
//!   same tick from the intact in-memory board; only a new cycle hour
//!   resets state and replays history.
//!
//! No transport failure is fatal: anything but "not found" is logged and
//! retried on the next tick.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::recovery;
use crate::render::{render_report, BoardStyle};
use crate::service::BoardState;
use crate::transport::{ChannelId, ChatTransport, MessageRef};

/// Inclusive minute-of-hour range during which the board is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishWindow {
    start_minute: u32,
    end_minute: u32,
}

impl PublishWindow {
    /// Window from `start_minute` to `end_minute`, both inclusive.
    /// Minutes are taken modulo 60; a start after the end wraps across
    /// the top of the hour.
    pub fn new(start_minute: u32, end_minute: u32) -> Self {
        Self {
            start_minute: start_minute % 60,
            end_minute: end_minute % 60,
        }
    }

    pub fn contains(self, minute: u32) -> bool {
        if self.start_minute <= self.end_minute {
            (self.start_minute..=self.end_minute).contains(&minute)
        } else {
            minute >= self.start_minute || minute <= self.end_minute
        }
    }
}

impl Default for PublishWindow {
    /// The production window: minutes 45 through 55.
    fn default() -> Self {
        Self::new(45, 55)
    }
}

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    AwaitingCycleStart,
    Live,
}

/// The currently-live board message and the cycle it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct LiveReport {
    pub message: MessageRef,
    pub cycle_hour: i64,
}

/// What a tick did. Primarily for tests and operational logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Outside the window; nothing to do.
    Idle,
    /// A new board message was posted.
    Created,
    /// The live message was edited in place.
    Edited,
    /// Rendered content matched the last publish; edit skipped.
    Unchanged,
    /// A transport call failed; will retry next tick.
    Failed,
}

enum RefreshResult {
    Edited,
    Unchanged,
    Failed,
    Lost,
}

/// Channel/window/timing configuration for the publisher.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub target: ChannelId,
    pub sources: Vec<ChannelId>,
    pub window: PublishWindow,
    /// How far back history replay reaches when rebuilding.
    pub lookback_minutes: i64,
    /// Display/schedule offset from UTC, in whole hours.
    pub utc_offset_hours: i32,
}

/// Owns the live message reference and drives the publish cycle.
pub struct Publisher {
    transport: Arc<dyn ChatTransport>,
    clock: Arc<dyn Clock>,
    catalog: Arc<Catalog>,
    style: BoardStyle,
    state: Arc<Mutex<BoardState>>,
    config: PublishConfig,
    phase: PublishState,
    live: Option<LiveReport>,
    last_cycle_started: Option<i64>,
    last_content: Option<String>,
}

impl Publisher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        clock: Arc<dyn Clock>,
        catalog: Arc<Catalog>,
        style: BoardStyle,
        state: Arc<Mutex<BoardState>>,
        config: PublishConfig,
    ) -> Self {
        Self {
            transport,
            clock,
            catalog,
            style,
            state,
            config,
            phase: PublishState::Idle,
            live: None,
            last_cycle_started: None,
            last_content: None,
        }
    }

    /// Current scheduler phase.
    pub fn phase(&self) -> PublishState {
        self.phase
    }

    /// The live message reference, if one exists.
    pub fn live_message(&self) -> Option<MessageRef> {
        self.live.map(|l| l.message)
    }

    /// Run one scheduler tick.
    pub async fn tick(&mut self) -> TickOutcome {
        let local = self.local_now();
        let minute = local.minute();
        let hour = cycle_hour(local);

        if !self.config.window.contains(minute) {
            if self.phase != PublishState::Idle {
                debug!(minute, "window exited, going idle");
                self.phase = PublishState::Idle;
            }
            return TickOutcome::Idle;
        }

        if self.phase == PublishState::Idle {
            debug!(minute, "window entered, awaiting cycle start");
            self.phase = PublishState::AwaitingCycleStart;
        }

        if self.phase == PublishState::Live {
            let current = self.live.map_or(false, |l| l.cycle_hour == hour);
            if current {
                match self.refresh(local, false).await {
                    RefreshResult::Edited => return TickOutcome::Edited,
                    RefreshResult::Unchanged => return TickOutcome::Unchanged,
                    RefreshResult::Failed => return TickOutcome::Failed,
                    // Edit target gone: fall through and recreate now.
                    RefreshResult::Lost => self.phase = PublishState::AwaitingCycleStart,
                }
            } else {
                self.phase = PublishState::AwaitingCycleStart;
            }
        }

        // Creation guard: one new message per calendar hour, unless the
        // live message for this hour was lost.
        if self.last_cycle_started == Some(hour) && self.live.is_some() {
            self.phase = PublishState::Live;
            return TickOutcome::Unchanged;
        }

        self.create(local, hour).await
    }

    /// Manual update path: refresh the live message regardless of the
    /// window, or recover and recreate when it is missing. Returns true
    /// when a publish happened.
    pub async fn force_update(&mut self) -> bool {
        let local = self.local_now();
        let hour = cycle_hour(local);

        if self.live.is_some() {
            match self.refresh(local, true).await {
                RefreshResult::Edited | RefreshResult::Unchanged => return true,
                RefreshResult::Failed => return false,
                RefreshResult::Lost => {}
            }
        }
        matches!(self.create(local, hour).await, TickOutcome::Created)
    }

    /// Push the current in-memory board to the live message, if one
    /// exists. Used after a manual override. Returns true only when the
    /// live message was found and edited.
    pub async fn refresh_live(&mut self) -> bool {
        if self.live.is_none() {
            return false;
        }
        let local = self.local_now();
        matches!(self.refresh(local, true).await, RefreshResult::Edited)
    }

    fn local_now(&self) -> DateTime<Utc> {
        self.clock.now() + Duration::hours(i64::from(self.config.utc_offset_hours))
    }

    async fn render_now(&self, local: DateTime<Utc>) -> String {
        let snapshot = self.state.lock().await.board.snapshot(&self.catalog);
        render_report(&self.catalog, &self.style, &snapshot, local)
    }

    /// Re-render and edit the live message in place. `forced` bypasses
    /// the unchanged-content skip (manual corrections always push).
    async fn refresh(&mut self, local: DateTime<Utc>, forced: bool) -> RefreshResult {
        let Some(live) = self.live else {
            return RefreshResult::Lost;
        };

        let content = self.render_now(local).await;
        if !forced && self.last_content.as_deref() == Some(content.as_str()) {
            return RefreshResult::Unchanged;
        }

        match self
            .transport
            .edit(self.config.target, live.message, &content)
            .await
        {
            Ok(()) => {
                self.last_content = Some(content);
                RefreshResult::Edited
            }
            Err(e) if e.is_not_found() => {
                warn!(message = live.message.0, "live report message is gone");
                self.live = None;
                RefreshResult::Lost
            }
            Err(e) => {
                warn!(error = %e, "board edit failed, will retry next tick");
                RefreshResult::Failed
            }
        }
    }

    /// Post a fresh board message.
    ///
    /// A new cycle hour rolls over first: board and alert log reset,
    /// then recent history is replayed. Recreating a lost message
    /// within the same cycle publishes the intact in-memory state as
    /// is; a reset here would forget reports (and fired alerts) older
    /// than the replay lookback.
    async fn create(&mut self, local: DateTime<Utc>, hour: i64) -> TickOutcome {
        if self.last_cycle_started != Some(hour) {
            match recovery::rebuild(
                self.transport.as_ref(),
                &self.catalog,
                &self.state,
                &self.config.sources,
                Duration::minutes(self.config.lookback_minutes),
                self.clock.now(),
            )
            .await
            {
                Ok(replayed) => info!(replayed, "rebuilt board from channel history"),
                Err(e) => warn!(error = %e, "history replay failed, publishing current state"),
            }
        }

        let content = self.render_now(local).await;
        match self.transport.send(self.config.target, &content).await {
            Ok(message) => {
                info!(message = message.0, hour, "posted new board message");
                self.live = Some(LiveReport {
                    message,
                    cycle_hour: hour,
                });
                self.last_cycle_started = Some(hour);
                self.last_content = Some(content);
                self.phase = PublishState::Live;
                TickOutcome::Created
            }
            Err(e) => {
                warn!(error = %e, "board post failed, will retry next tick");
                TickOutcome::Failed
            }
        }
    }
}

/// Cycle identity: hours since the epoch in the publisher's local time.
fn cycle_hour(local: DateTime<Utc>) -> i64 {
    local.timestamp().div_euclid(3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::consensus::ResolutionPolicy;
    use crate::testing::MockTransport;
    use chrono::TimeZone;

    const TARGET: ChannelId = ChannelId(20);
    const SOURCE: ChannelId = ChannelId(10);

    struct Fixture {
        publisher: Publisher,
        transport: Arc<MockTransport>,
        clock: Arc<FixedClock>,
        state: Arc<Mutex<BoardState>>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 9, 18, 0, 0).unwrap(),
        ));
        let catalog = Arc::new(Catalog::infernal_castle());
        let state = Arc::new(Mutex::new(BoardState::new(
            ResolutionPolicy::PluralityOnSecond,
        )));
        let publisher = Publisher::new(
            transport.clone(),
            clock.clone(),
            catalog,
            BoardStyle::infernal_castle(),
            state.clone(),
            PublishConfig {
                target: TARGET,
                sources: vec![SOURCE],
                window: PublishWindow::default(),
                lookback_minutes: 10,
                utc_offset_hours: 0,
            },
        );
        Fixture {
            publisher,
            transport,
            clock,
            state,
        }
    }

    #[test]
    fn test_window_contains() {
        let window = PublishWindow::new(45, 55);
        assert!(!window.contains(44));
        assert!(window.contains(45));
        assert!(window.contains(55));
        assert!(!window.contains(56));

        let wrapping = PublishWindow::new(55, 5);
        assert!(wrapping.contains(58));
        assert!(wrapping.contains(3));
        assert!(!wrapping.contains(30));
    }

    #[tokio::test]
    async fn test_idle_outside_window() {
        let mut f = fixture();
        assert_eq!(f.publisher.tick().await, TickOutcome::Idle);
        assert_eq!(f.publisher.phase(), PublishState::Idle);
        assert_eq!(f.transport.send_count(), 0);
    }

    #[tokio::test]
    async fn test_one_create_then_edits_within_hour() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());

        assert_eq!(f.publisher.tick().await, TickOutcome::Created);
        assert_eq!(f.publisher.phase(), PublishState::Live);

        // Same minute: content identical, edit skipped.
        assert_eq!(f.publisher.tick().await, TickOutcome::Unchanged);

        // Next minute: timestamp line changed, edit in place.
        f.clock.advance_minutes(1);
        assert_eq!(f.publisher.tick().await, TickOutcome::Edited);
        f.clock.advance_minutes(1);
        assert_eq!(f.publisher.tick().await, TickOutcome::Edited);

        assert_eq!(f.transport.send_count(), 1);
        assert!(f.transport.edit_count() >= 2);
    }

    #[tokio::test]
    async fn test_window_exit_goes_idle_and_keeps_reference() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());
        f.publisher.tick().await;
        let live = f.publisher.live_message().unwrap();

        f.clock.advance_minutes(11); // minute 56
        assert_eq!(f.publisher.tick().await, TickOutcome::Idle);
        assert_eq!(f.publisher.phase(), PublishState::Idle);
        assert_eq!(f.publisher.live_message(), Some(live));
    }

    #[tokio::test]
    async fn test_next_hour_creates_fresh_message() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());
        f.publisher.tick().await;
        let first = f.publisher.live_message().unwrap();

        // Leave the window, enter the next hour's window.
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 19, 45, 0).unwrap());
        assert_eq!(f.publisher.tick().await, TickOutcome::Created);
        let second = f.publisher.live_message().unwrap();
        assert_ne!(first, second);
        assert_eq!(f.transport.send_count(), 2);
    }

    #[tokio::test]
    async fn test_lost_message_recreated_same_tick() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());
        f.publisher.tick().await;
        let first = f.publisher.live_message().unwrap();

        f.transport.delete_message(TARGET, first);
        f.clock.advance_minutes(1);
        assert_eq!(f.publisher.tick().await, TickOutcome::Created);
        let second = f.publisher.live_message().unwrap();
        assert_ne!(first, second);
        assert_eq!(f.publisher.phase(), PublishState::Live);
    }

    #[tokio::test]
    async fn test_midcycle_recreate_preserves_board_state() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());
        f.publisher.tick().await;
        let first = f.publisher.live_message().unwrap();

        // A report recorded live after cycle start; channel history is
        // empty, so a history replay could never reproduce it.
        let catalog = Catalog::infernal_castle();
        let floor = catalog.floor(30).unwrap();
        let gucci = catalog.boss_by_alias("gucci").unwrap();
        f.state.lock().await.board.record(floor, gucci);

        f.transport.delete_message(TARGET, first);
        f.clock.advance_minutes(1);
        assert_eq!(f.publisher.tick().await, TickOutcome::Created);

        // The recreated board carries the in-memory state forward.
        assert_eq!(f.state.lock().await.board.resolved(floor), Some(gucci));
        let content = f.transport.last_board_content(TARGET).unwrap();
        assert!(content.contains("**Gucci**"));
    }

    #[tokio::test]
    async fn test_send_failure_retries_next_tick() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());
        f.transport.fail_sends(1);

        assert_eq!(f.publisher.tick().await, TickOutcome::Failed);
        assert_eq!(f.publisher.phase(), PublishState::AwaitingCycleStart);

        assert_eq!(f.publisher.tick().await, TickOutcome::Created);
        assert_eq!(f.publisher.phase(), PublishState::Live);
    }

    #[tokio::test]
    async fn test_edit_failure_is_not_fatal() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());
        f.publisher.tick().await;

        f.clock.advance_minutes(1);
        f.transport.fail_edits(1);
        assert_eq!(f.publisher.tick().await, TickOutcome::Failed);

        // The reference survives; the next tick edits normally.
        assert_eq!(f.publisher.tick().await, TickOutcome::Edited);
    }

    #[tokio::test]
    async fn test_force_update_outside_window() {
        let mut f = fixture();
        // Minute 0: far outside the window.
        assert!(f.publisher.force_update().await);
        assert_eq!(f.transport.send_count(), 1);

        // With a live message, force refreshes it in place.
        assert!(f.publisher.force_update().await);
        assert_eq!(f.transport.send_count(), 1);
        assert_eq!(f.transport.edit_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_live_without_message() {
        let mut f = fixture();
        assert!(!f.publisher.refresh_live().await);
    }

    #[tokio::test]
    async fn test_at_most_one_create_per_hour() {
        let mut f = fixture();
        f.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap());

        // Tick through the whole window at 20s cadence.
        for _ in 0..33 {
            f.publisher.tick().await;
            f.clock.set(f.clock.now() + Duration::seconds(20));
        }
        assert_eq!(f.transport.send_count(), 1);
    }
}
