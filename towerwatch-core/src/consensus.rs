//! Per-floor vote tallies and the consensus resolution policies.
//!
//! The board is the single source of truth for "which boss is on which
//! floor". It is not internally synchronized; the service serializes all
//! mutation through one mutex so inbound handling, history replay, and
//! scheduler reads never interleave mid-update.

use std::collections::BTreeMap;

use crate::catalog::{BossId, Catalog, Floor};

/// How disagreement between reports is resolved into a single boss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// One distinct boss resolves immediately; from the second distinct
    /// boss onward the resolved value is the current highest count,
    /// recomputed after every report. Ties go to the earliest-seen boss.
    PluralityOnSecond,
    /// The first-ever report resolves provisionally. Afterwards the
    /// resolved value only changes when some boss's count reaches the
    /// threshold; sub-threshold competition never downgrades it.
    Threshold(u32),
}

/// Vote tally for one floor.
///
/// Counts are kept in insertion order so "earliest-seen" tie-breaks fall
/// out of plain iteration.
#[derive(Debug, Clone, Default)]
pub struct FloorTally {
    counts: Vec<(BossId, u32)>,
    resolved: Option<BossId>,
}

impl FloorTally {
    /// The currently resolved boss, if any.
    pub fn resolved(&self) -> Option<BossId> {
        self.resolved
    }

    /// Report count for a boss on this floor.
    pub fn count(&self, boss: BossId) -> u32 {
        self.counts
            .iter()
            .find(|(b, _)| *b == boss)
            .map_or(0, |(_, n)| *n)
    }

    /// All (boss, count) pairs in first-reported order.
    pub fn reports(&self) -> impl Iterator<Item = (BossId, u32)> + '_ {
        self.counts.iter().copied()
    }

    fn bump(&mut self, boss: BossId) -> u32 {
        for (b, n) in &mut self.counts {
            if *b == boss {
                *n += 1;
                return *n;
            }
        }
        self.counts.push((boss, 1));
        1
    }

    /// Highest-count boss, earliest-seen among ties.
    fn leader(&self) -> Option<BossId> {
        let mut best: Option<(BossId, u32)> = None;
        for &(boss, count) in &self.counts {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((boss, count)),
            }
        }
        best.map(|(boss, _)| boss)
    }
}

/// The consensus store: one tally per floor, created lazily on first
/// report, reset at rollover and by manual override.
#[derive(Debug, Clone)]
pub struct ReportBoard {
    policy: ResolutionPolicy,
    floors: BTreeMap<Floor, FloorTally>,
}

impl ReportBoard {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            floors: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Record one report and re-resolve the floor under the configured
    /// policy. Returns the floor's tally after the update.
    pub fn record(&mut self, floor: Floor, boss: BossId) -> &FloorTally {
        let tally = self.floors.entry(floor).or_default();
        let count = tally.bump(boss);

        match self.policy {
            ResolutionPolicy::PluralityOnSecond => {
                tally.resolved = tally.leader();
            }
            ResolutionPolicy::Threshold(threshold) => {
                if count >= threshold {
                    tally.resolved = Some(boss);
                } else if tally.resolved.is_none() {
                    // Nothing ever resolved here: first report wins
                    // provisionally.
                    tally.resolved = Some(boss);
                }
            }
        }
        tally
    }

    /// Forcibly set the resolved boss, collapsing the tally to a single
    /// count of one. Manual correction path, independent of policy.
    pub fn force(&mut self, floor: Floor, boss: BossId) {
        let tally = self.floors.entry(floor).or_default();
        tally.counts = vec![(boss, 1)];
        tally.resolved = Some(boss);
    }

    /// Clear one floor's tally and resolved value.
    pub fn reset(&mut self, floor: Floor) {
        self.floors.remove(&floor);
    }

    /// Clear every floor. Used at the hourly rollover.
    pub fn reset_all(&mut self) {
        self.floors.clear();
    }

    /// Currently resolved boss for a floor, if any.
    pub fn resolved(&self, floor: Floor) -> Option<BossId> {
        self.floors.get(&floor).and_then(FloorTally::resolved)
    }

    /// Tally for a floor, if any reports have arrived.
    pub fn tally(&self, floor: Floor) -> Option<&FloorTally> {
        self.floors.get(&floor)
    }

    /// Render-ready view: every catalog floor, ascending, with its
    /// resolved boss or `None`.
    pub fn snapshot(&self, catalog: &Catalog) -> BTreeMap<Floor, Option<BossId>> {
        catalog
            .floors()
            .map(|floor| (floor, self.resolved(floor)))
            .collect()
    }
}
