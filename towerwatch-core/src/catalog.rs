//! The closed configuration sets: floors, bosses, aliases, glyphs.
//!
//! Everything the extractor and renderer are allowed to recognize lives
//! here. Floors and bosses outside the catalog are rejected at parse
//! time, and boss ordering is significant: it decides alias-scan
//! priority and the earliest-seen tie-break in the consensus policies.

use std::collections::BTreeSet;
use std::fmt;

/// A tower floor from the catalog's closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Floor(u16);

impl Floor {
    pub fn number(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a boss in the catalog roster.
///
/// Stable for the lifetime of the catalog (it indexes the roster in
/// configured order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BossId(usize);

/// One boss in the roster: display name, glyph, and its report aliases.
#[derive(Debug, Clone)]
pub struct BossEntry {
    /// Canonical display name, e.g. "Gucci".
    pub name: String,
    /// Display glyph for the status board.
    pub glyph: String,
    /// Lowercase aliases, in configured priority order.
    pub aliases: Vec<String>,
}

/// The full closed configuration set.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    floors: BTreeSet<Floor>,
    bosses: Vec<BossEntry>,
    rare: Option<BossId>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a floor to the closed set.
    pub fn with_floor(mut self, number: u16) -> Self {
        self.floors.insert(Floor(number));
        self
    }

    /// Add a boss to the roster. Aliases are stored lowercased.
    ///
    /// Roster order is the alias-scan priority and the earliest-seen
    /// tie-break order, so add bosses in the order they should win ties.
    pub fn with_boss(mut self, name: &str, glyph: &str, aliases: &[&str]) -> Self {
        self.bosses.push(BossEntry {
            name: name.to_string(),
            glyph: glyph.to_string(),
            aliases: aliases.iter().map(|a| a.to_lowercase()).collect(),
        });
        self
    }

    /// Mark an already-added boss (by canonical name) as the rare,
    /// high-priority one. Unknown names leave the marker unset.
    pub fn with_rare_boss(mut self, name: &str) -> Self {
        self.rare = self
            .bosses
            .iter()
            .position(|b| b.name.eq_ignore_ascii_case(name))
            .map(BossId);
        self
    }

    /// The production Infernal Castle roster.
    pub fn infernal_castle() -> Self {
        let mut catalog = Self::new();
        for floor in [30, 35, 40, 45, 55, 60, 65, 70] {
            catalog = catalog.with_floor(floor);
        }
        catalog
            .with_boss("Vermillion", "🔥", &["vermillion", "igris"])
            .with_boss("Dor", "🛡️", &["dor"])
            .with_boss("Mifalcon", "🦅", &["mifalcon"])
            .with_boss("Murcielago", "🦇", &["murcielago"])
            .with_boss("Time King", "⏳", &["time", "time king", "timeking"])
            .with_boss("Chainsaw", "🪚", &["chainsaw", "chainsaw man"])
            .with_boss("Gucci", "👜", &["gucci", "guci", "pucci"])
            .with_boss("Frioo", "❄️", &["frioo", "frio", "friza"])
            .with_boss("Paitama", "👊", &["saitama", "paitama"])
            .with_boss("Tuturum", "⚡", &["tuturum", "okarun"])
            .with_boss(
                "Dae In",
                "🗡️",
                &[
                    "dae in", "cha hae-in", "cha hae", "chahae", "chahaein", "cha in", "chae in",
                    "chae",
                ],
            )
            .with_boss("God Speed", "💨", &["god speed", "godspeed", "kilua"])
            .with_boss("Wesil", "🦊", &["wesil", "esil"])
            .with_boss("Magma", "🌋", &["magma"])
            .with_boss("Monarch", "👑", &["monarch", "sjw", "shadow monarch"])
            .with_rare_boss("Monarch")
    }

    /// Look up a floor by number, returning it only if configured.
    pub fn floor(&self, number: u16) -> Option<Floor> {
        let floor = Floor(number);
        self.floors.contains(&floor).then_some(floor)
    }

    /// Parse a floor from text, e.g. command arguments.
    pub fn parse_floor(&self, text: &str) -> Option<Floor> {
        text.trim().parse().ok().and_then(|n| self.floor(n))
    }

    /// All configured floors, ascending numeric order.
    pub fn floors(&self) -> impl Iterator<Item = Floor> + '_ {
        self.floors.iter().copied()
    }

    /// The roster in configured order.
    pub fn bosses(&self) -> impl Iterator<Item = (BossId, &BossEntry)> {
        self.bosses.iter().enumerate().map(|(i, b)| (BossId(i), b))
    }

    /// Entry for a boss id.
    pub fn boss(&self, id: BossId) -> &BossEntry {
        &self.bosses[id.0]
    }

    /// Exact (case-insensitive) alias lookup, for command validation.
    pub fn boss_by_alias(&self, alias: &str) -> Option<BossId> {
        let needle = alias.trim().to_lowercase();
        self.bosses()
            .find(|(_, entry)| entry.aliases.iter().any(|a| *a == needle))
            .map(|(id, _)| id)
    }

    /// The configured rare boss, if any.
    pub fn rare_boss(&self) -> Option<BossId> {
        self.rare
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_lookup_rejects_unconfigured() {
        let catalog = Catalog::infernal_castle();
        assert!(catalog.floor(70).is_some());
        assert!(catalog.floor(50).is_none());
        assert!(catalog.floor(7).is_none());
    }

    #[test]
    fn test_parse_floor() {
        let catalog = Catalog::infernal_castle();
        assert_eq!(catalog.parse_floor(" 45 ").map(Floor::number), Some(45));
        assert!(catalog.parse_floor("45b").is_none());
        assert!(catalog.parse_floor("ninety").is_none());
    }

    #[test]
    fn test_floors_sorted_ascending() {
        let catalog = Catalog::infernal_castle();
        let numbers: Vec<u16> = catalog.floors().map(Floor::number).collect();
        assert_eq!(numbers, vec![30, 35, 40, 45, 55, 60, 65, 70]);
    }

    #[test]
    fn test_alias_lookup() {
        let catalog = Catalog::infernal_castle();
        let gucci = catalog.boss_by_alias("PUCCI").unwrap();
        assert_eq!(catalog.boss(gucci).name, "Gucci");
        assert!(catalog.boss_by_alias("gandalf").is_none());
    }

    #[test]
    fn test_rare_boss_marker() {
        let catalog = Catalog::infernal_castle();
        let rare = catalog.rare_boss().unwrap();
        assert_eq!(catalog.boss(rare).name, "Monarch");

        let unmarked = Catalog::new().with_boss("Dor", "🛡️", &["dor"]);
        assert!(unmarked.rare_boss().is_none());

        let unknown = Catalog::new()
            .with_boss("Dor", "🛡️", &["dor"])
            .with_rare_boss("Nobody");
        assert!(unknown.rare_boss().is_none());
    }
}
