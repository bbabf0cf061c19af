//! One-shot rare-boss alerting.
//!
//! At most one alert per floor per publish cycle; the log is cleared
//! together with the board at rollover.

use std::collections::BTreeSet;

use crate::catalog::{BossId, Catalog, Floor};

/// Tracks which floors have already alerted this cycle.
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    fired: BTreeSet<Floor>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per floor per cycle, and only when `boss` is the
    /// catalog's rare boss. Records the floor as alerted on a true
    /// return.
    pub fn should_alert(&mut self, catalog: &Catalog, floor: Floor, boss: BossId) -> bool {
        if catalog.rare_boss() != Some(boss) {
            return false;
        }
        self.fired.insert(floor)
    }

    /// Clear all recorded alerts. Called at rollover.
    pub fn reset(&mut self) {
        self.fired.clear();
    }
}
