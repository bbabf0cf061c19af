//! Testing utilities for the report watch.
//!
//! This module provides tools for integration testing:
//! - `MockTransport` for deterministic tests without a live chat platform
//! - `TestHarness` for scripted report/publish scenarios
//! - Assertion helpers for verifying board content

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::catalog::Catalog;
use crate::clock::{Clock, FixedClock};
use crate::consensus::ResolutionPolicy;
use crate::service::{Watch, WatchConfig};
use crate::transport::{ChannelId, ChatMessage, ChatTransport, MessageRef, TransportError};

/// Source channel used by the default harness.
pub const SOURCE_CHANNEL: ChannelId = ChannelId(100);
/// Target channel used by the default harness.
pub const TARGET_CHANNEL: ChannelId = ChannelId(200);

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageRef,
    author_is_self: bool,
    content: String,
    timestamp: DateTime<Utc>,
    deleted: bool,
}

#[derive(Debug, Default)]
struct MockInner {
    next_id: u64,
    channels: HashMap<ChannelId, Vec<StoredMessage>>,
    sent_log: Vec<(ChannelId, String)>,
    edit_log: Vec<(ChannelId, MessageRef, String)>,
    fail_sends: u32,
    fail_edits: u32,
    fail_history: u32,
}

/// An in-memory transport with scriptable failures.
///
/// Messages sent through it are recorded as self-authored; observer
/// reports are seeded with [`MockTransport::push_message`]. Failure
/// counters make the next N calls of a kind fail with a network error.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Mutex<MockInner>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an observer (or self) message into a channel's history.
    pub fn push_message(
        &self,
        channel: ChannelId,
        author_is_self: bool,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> MessageRef {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = MessageRef(inner.next_id);
        inner.channels.entry(channel).or_default().push(StoredMessage {
            id,
            author_is_self,
            content: content.to_string(),
            timestamp,
            deleted: false,
        });
        id
    }

    /// Mark a message as gone; edit and fetch then report `NotFound`.
    pub fn delete_message(&self, channel: ChannelId, message: MessageRef) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(messages) = inner.channels.get_mut(&channel) {
            for stored in messages {
                if stored.id == message {
                    stored.deleted = true;
                }
            }
        }
    }

    /// Fail the next `n` sends with a network error.
    pub fn fail_sends(&self, n: u32) {
        self.inner.lock().unwrap().fail_sends = n;
    }

    /// Fail the next `n` edits with a network error.
    pub fn fail_edits(&self, n: u32) {
        self.inner.lock().unwrap().fail_edits = n;
    }

    /// Fail the next `n` history fetches with a network error.
    pub fn fail_history(&self, n: u32) {
        self.inner.lock().unwrap().fail_history = n;
    }

    /// Number of successful sends so far.
    pub fn send_count(&self) -> usize {
        self.inner.lock().unwrap().sent_log.len()
    }

    /// Number of successful edits so far.
    pub fn edit_count(&self) -> usize {
        self.inner.lock().unwrap().edit_log.len()
    }

    /// Contents of all sends to a channel, in order, as originally sent.
    pub fn sent_contents(&self, channel: ChannelId) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .sent_log
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, content)| content.clone())
            .collect()
    }

    /// Reference of the most recent self-sent, non-deleted message in a
    /// channel.
    pub fn last_board_message(&self, channel: ChannelId) -> Option<MessageRef> {
        self.inner
            .lock()
            .unwrap()
            .channels
            .get(&channel)?
            .iter()
            .rev()
            .find(|m| m.author_is_self && !m.deleted)
            .map(|m| m.id)
    }

    /// Current content of the most recent self-sent, non-deleted message
    /// in a channel (the live board, after any edits).
    pub fn last_board_content(&self, channel: ChannelId) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .channels
            .get(&channel)?
            .iter()
            .rev()
            .find(|m| m.author_is_self && !m.deleted)
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, channel: ChannelId, content: &str) -> Result<MessageRef, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_sends > 0 {
            inner.fail_sends -= 1;
            return Err(TransportError::Network("scripted send failure".into()));
        }
        inner.next_id += 1;
        let id = MessageRef(inner.next_id);
        let timestamp = Utc.timestamp_opt(1_750_000_000 + inner.next_id as i64, 0).unwrap();
        inner.channels.entry(channel).or_default().push(StoredMessage {
            id,
            author_is_self: true,
            content: content.to_string(),
            timestamp,
            deleted: false,
        });
        inner.sent_log.push((channel, content.to_string()));
        Ok(id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageRef,
        content: &str,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_edits > 0 {
            inner.fail_edits -= 1;
            return Err(TransportError::Network("scripted edit failure".into()));
        }
        let stored = inner
            .channels
            .get_mut(&channel)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == message && !m.deleted))
            .ok_or(TransportError::NotFound)?;
        stored.content = content.to_string();
        inner.edit_log.push((channel, message, content.to_string()));
        Ok(())
    }

    async fn fetch(
        &self,
        channel: ChannelId,
        message: MessageRef,
    ) -> Result<ChatMessage, TransportError> {
        let inner = self.inner.lock().unwrap();
        inner
            .channels
            .get(&channel)
            .and_then(|msgs| msgs.iter().find(|m| m.id == message && !m.deleted))
            .map(|m| ChatMessage {
                id: m.id,
                author_is_self: m.author_is_self,
                content: m.content.clone(),
                timestamp: m.timestamp,
            })
            .ok_or(TransportError::NotFound)
    }

    async fn history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_history > 0 {
            inner.fail_history -= 1;
            return Err(TransportError::Network("scripted history failure".into()));
        }
        let messages = inner
            .channels
            .get(&channel)
            .map(|msgs| {
                msgs.iter()
                    .rev()
                    .filter(|m| !m.deleted)
                    .take(limit)
                    .map(|m| ChatMessage {
                        id: m.id,
                        author_is_self: m.author_is_self,
                        content: m.content.clone(),
                        timestamp: m.timestamp,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(messages)
    }
}

/// Test harness for running watch scenarios against the mock transport
/// and a fixed clock.
pub struct TestHarness {
    pub clock: Arc<FixedClock>,
    pub transport: Arc<MockTransport>,
    pub watch: Watch,
}

impl TestHarness {
    /// Harness with the production catalog and default config
    /// (plurality policy, 45-55 window).
    pub fn new() -> Self {
        Self::with_config(WatchConfig::new(SOURCE_CHANNEL, TARGET_CHANNEL))
    }

    /// Harness with a specific resolution policy.
    pub fn with_policy(policy: ResolutionPolicy) -> Self {
        Self::with_config(WatchConfig::new(SOURCE_CHANNEL, TARGET_CHANNEL).with_policy(policy))
    }

    /// Harness with full config control. The clock starts at 18:00 UTC,
    /// outside the default window.
    pub fn with_config(config: WatchConfig) -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 9, 18, 0, 0).unwrap(),
        ));
        let transport = Arc::new(MockTransport::new());
        let watch = Watch::with_clock(
            transport.clone() as Arc<dyn ChatTransport>,
            Catalog::infernal_castle(),
            config,
            clock.clone(),
        );
        Self {
            clock,
            transport,
            watch,
        }
    }

    /// Deliver an observer report to the source channel. The message
    /// lands in channel history (visible to replay) and is handed to the
    /// watch, matching how live traffic behaves.
    pub async fn report(&self, text: &str) {
        self.transport
            .push_message(SOURCE_CHANNEL, false, text, self.clock.now());
        self.watch.on_message(SOURCE_CHANNEL, false, text).await;
    }

    /// Seed a report into channel history at the clock's current time,
    /// without delivering it live (it is only seen by replay).
    pub fn backfill_report(&self, text: &str) {
        self.transport
            .push_message(SOURCE_CHANNEL, false, text, self.clock.now());
    }

    /// Move the clock to the given hour and minute of the test day.
    pub fn set_time(&self, hour: u32, minute: u32) {
        self.clock
            .set(Utc.with_ymd_and_hms(2025, 6, 9, hour, minute, 0).unwrap());
    }

    /// Advance the clock by whole minutes.
    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance_minutes(minutes);
    }

    /// Resolved boss name for a floor number, if any.
    pub async fn resolved_name(&self, floor_number: u16) -> Option<String> {
        let floor = self.watch.catalog().floor(floor_number)?;
        let boss = self.watch.resolved(floor).await?;
        Some(self.watch.catalog().boss(boss).name.clone())
    }

    /// Current content of the live board, if one has been published.
    pub fn board_content(&self) -> Option<String> {
        self.transport.last_board_content(TARGET_CHANNEL)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the board content shows a boss on a floor.
#[track_caller]
pub fn assert_board_shows(content: &str, floor: u16, boss_name: &str) {
    let needle = format!("**Floor {floor}** - ");
    let line = content
        .lines()
        .find(|l| l.starts_with(&needle))
        .unwrap_or_else(|| panic!("no line for floor {floor} in board:\n{content}"));
    assert!(
        line.contains(&format!("**{boss_name}**")),
        "expected floor {floor} to show {boss_name}, got: {line}"
    );
}

/// Assert that the board content shows the loading placeholder for a
/// floor.
#[track_caller]
pub fn assert_board_loading(content: &str, floor: u16) {
    let needle = format!("**Floor {floor}** - ");
    let line = content
        .lines()
        .find(|l| l.starts_with(&needle))
        .unwrap_or_else(|| panic!("no line for floor {floor} in board:\n{content}"));
    assert!(
        line.contains("*Loading*"),
        "expected floor {floor} to be unresolved, got: {line}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_mock_send_edit_fetch_roundtrip() {
        let transport = MockTransport::new();
        let channel = ChannelId(1);

        let id = transport.send(channel, "first").await.unwrap();
        transport.edit(channel, id, "second").await.unwrap();

        let message = transport.fetch(channel, id).await.unwrap();
        assert_eq!(message.content, "second");
        assert!(message.author_is_self);
        assert_eq!(transport.sent_contents(channel), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_deleted_message_is_not_found() {
        let transport = MockTransport::new();
        let channel = ChannelId(1);

        let id = transport.send(channel, "board").await.unwrap();
        transport.delete_message(channel, id);

        assert!(matches!(
            transport.edit(channel, id, "update").await,
            Err(TransportError::NotFound)
        ));
        assert!(matches!(
            transport.fetch(channel, id).await,
            Err(TransportError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_mock_history_newest_first() {
        let transport = MockTransport::new();
        let channel = ChannelId(1);
        let base = Utc.with_ymd_and_hms(2025, 6, 9, 18, 0, 0).unwrap();
        transport.push_message(channel, false, "oldest", base);
        transport.push_message(channel, false, "newest", base + Duration::seconds(5));

        let history = transport.history(channel, 10).await.unwrap();
        assert_eq!(history[0].content, "newest");
        assert_eq!(history[1].content, "oldest");
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed() {
        let transport = MockTransport::new();
        let channel = ChannelId(1);
        transport.fail_sends(1);

        assert!(transport.send(channel, "x").await.is_err());
        assert!(transport.send(channel, "x").await.is_ok());
    }

    #[tokio::test]
    async fn test_harness_reporting() {
        let harness = TestHarness::new();
        harness.report("F70 Frioo").await;
        assert_eq!(harness.resolved_name(70).await.as_deref(), Some("Frioo"));
    }
}
