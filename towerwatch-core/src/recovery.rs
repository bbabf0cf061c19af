//! Rebuilding consensus state from recent channel history.
//!
//! At the start of a publish cycle (including the first cycle after a
//! process restart) the board is reconstructed by replaying recent
//! source-channel history through the extractor exactly as live traffic
//! would be. Replay always starts from an empty board, which is what
//! makes re-running the same window converge to the same resolved
//! values. Recreating a lost message within a cycle does not come
//! through here; the in-memory state is still authoritative then.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::catalog::Catalog;
use crate::extract::extract;
use crate::service::BoardState;
use crate::transport::{ChannelId, ChatTransport, TransportError};

/// How many messages to pull per channel when replaying. The lookback
/// cutoff trims this further.
const HISTORY_FETCH_LIMIT: usize = 100;

/// Replay recent history through the extractor and board.
///
/// Fetches up to [`HISTORY_FETCH_LIMIT`] messages per source channel,
/// drops self-authored ones and anything older than `lookback`, sorts
/// oldest-to-newest, then resets the board and alert log and records
/// each extracted sighting. Alerts are marked but never sent here, so a
/// replay cannot re-fire one that already went out.
///
/// Returns the number of sightings replayed. On a fetch failure the
/// existing board is left untouched.
pub async fn rebuild(
    transport: &dyn ChatTransport,
    catalog: &Catalog,
    state: &Mutex<BoardState>,
    channels: &[ChannelId],
    lookback: Duration,
    now: DateTime<Utc>,
) -> Result<usize, TransportError> {
    let cutoff = now - lookback;

    let mut replayable = Vec::new();
    for &channel in channels {
        let history = transport.history(channel, HISTORY_FETCH_LIMIT).await?;
        replayable.extend(
            history
                .into_iter()
                .filter(|m| !m.author_is_self && m.timestamp >= cutoff),
        );
    }
    replayable.sort_by_key(|m| (m.timestamp, m.id));

    let mut state = state.lock().await;
    state.board.reset_all();
    state.alerts.reset();

    let mut replayed = 0;
    for message in &replayable {
        if let Some(sighting) = extract(catalog, &message.content) {
            state.board.record(sighting.floor, sighting.boss);
            state
                .alerts
                .should_alert(catalog, sighting.floor, sighting.boss);
            replayed += 1;
        }
    }

    debug!(
        candidates = replayable.len(),
        replayed, "replayed channel history"
    );
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ResolutionPolicy;
    use crate::testing::MockTransport;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn state() -> Mutex<BoardState> {
        Mutex::new(BoardState::new(ResolutionPolicy::PluralityOnSecond))
    }

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 9, 18, 40, second).unwrap()
    }

    #[tokio::test]
    async fn test_replay_rebuilds_resolved_values() {
        let catalog = Catalog::infernal_castle();
        let transport = Arc::new(MockTransport::new());
        let channel = ChannelId(1);
        transport.push_message(channel, false, "F70 frioo", at(1));
        transport.push_message(channel, false, "70 gucci", at(2));
        transport.push_message(channel, false, "f70 gucci again", at(3));

        let state = state();
        let now = Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap();
        let replayed = rebuild(
            transport.as_ref(),
            &catalog,
            &state,
            &[channel],
            Duration::minutes(10),
            now,
        )
        .await
        .unwrap();

        assert_eq!(replayed, 3);
        let floor = catalog.floor(70).unwrap();
        let resolved = state.lock().await.board.resolved(floor);
        assert_eq!(resolved, catalog.boss_by_alias("gucci"));
    }

    #[tokio::test]
    async fn test_replay_skips_self_and_stale_messages() {
        let catalog = Catalog::infernal_castle();
        let transport = Arc::new(MockTransport::new());
        let channel = ChannelId(1);
        // Our own published board must not be re-ingested.
        transport.push_message(channel, true, "**Floor 70** - ❄️ **Frioo**", at(1));
        // Outside the lookback window.
        let stale = Utc.with_ymd_and_hms(2025, 6, 9, 17, 0, 0).unwrap();
        transport.push_message(channel, false, "f70 frioo", stale);
        transport.push_message(channel, false, "f70 gucci", at(2));

        let state = state();
        let now = Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap();
        let replayed = rebuild(
            transport.as_ref(),
            &catalog,
            &state,
            &[channel],
            Duration::minutes(10),
            now,
        )
        .await
        .unwrap();

        assert_eq!(replayed, 1);
        let floor = catalog.floor(70).unwrap();
        let resolved = state.lock().await.board.resolved(floor);
        assert_eq!(resolved, catalog.boss_by_alias("gucci"));
    }

    #[tokio::test]
    async fn test_replay_twice_converges() {
        let catalog = Catalog::infernal_castle();
        let transport = Arc::new(MockTransport::new());
        let channel = ChannelId(1);
        transport.push_message(channel, false, "f45 saitama", at(1));
        transport.push_message(channel, false, "f45 gucci", at(2));
        transport.push_message(channel, false, "f45 gucci", at(3));

        let state = state();
        let now = Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap();
        let window = Duration::minutes(10);

        rebuild(transport.as_ref(), &catalog, &state, &[channel], window, now)
            .await
            .unwrap();
        let first = state.lock().await.board.snapshot(&catalog);

        rebuild(transport.as_ref(), &catalog, &state, &[channel], window, now)
            .await
            .unwrap();
        let second = state.lock().await.board.snapshot(&catalog);

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_board_untouched() {
        let catalog = Catalog::infernal_castle();
        let transport = Arc::new(MockTransport::new());
        let channel = ChannelId(1);
        let floor = catalog.floor(30).unwrap();
        let gucci = catalog.boss_by_alias("gucci").unwrap();

        let state = state();
        state.lock().await.board.record(floor, gucci);

        transport.fail_history(1);
        let now = Utc.with_ymd_and_hms(2025, 6, 9, 18, 45, 0).unwrap();
        let result = rebuild(
            transport.as_ref(),
            &catalog,
            &state,
            &[channel],
            Duration::minutes(10),
            now,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(state.lock().await.board.resolved(floor), Some(gucci));
    }
}
