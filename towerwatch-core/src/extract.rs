//! Turning raw report text into a structured sighting.
//!
//! Extraction is a pure function with two independent passes over the
//! lowercased input: first the floor token, then a boss alias scan over
//! the text with the floor token removed. Removing the floor substring
//! before the alias pass keeps floor digits from colliding with alias
//! text.
//!
//! Word boundaries are explicit rather than regex `\b`: a span matches
//! only when the characters on both sides are absent or non-alphanumeric.
//! Hyphens and punctuation count as boundaries.

use crate::catalog::{BossId, Catalog, Floor};

/// A structured sighting extracted from one report message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
    pub floor: Floor,
    pub boss: BossId,
}

/// Extract a `(floor, boss)` sighting from free text.
///
/// Returns `None` when either the floor or the boss is missing or not in
/// the catalog. A miss is expected traffic, not an error.
pub fn extract(catalog: &Catalog, text: &str) -> Option<Sighting> {
    let lower = text.to_lowercase();

    let (floor, span) = find_floor(catalog, &lower)?;

    // Strip the floor token (marker included) before scanning aliases.
    let mut remaining = String::with_capacity(lower.len());
    remaining.push_str(&lower[..span.0]);
    remaining.push(' ');
    remaining.push_str(&lower[span.1..]);

    let boss = find_boss(catalog, &remaining)?;
    Some(Sighting { floor, boss })
}

/// Locate a configured floor token and its byte span in lowercased text.
///
/// A floor token is a digit run that parses to a configured floor,
/// optionally preceded by an attached `f`/`floor` marker and optionally
/// followed by a colon. The digit run must be bounded: no alphanumerics
/// directly before the marker or after the digits.
fn find_floor(catalog: &Catalog, text: &str) -> Option<(Floor, (usize, usize))> {
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        // Full digit run starting at i.
        let mut end = i;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }

        if let Some(hit) = floor_at(catalog, text, i, end) {
            return Some(hit);
        }
        i = end;
    }
    None
}

/// Check whether the digit run `text[start..end]` is a valid floor token
/// and compute the span to strip.
fn floor_at(
    catalog: &Catalog,
    text: &str,
    start: usize,
    end: usize,
) -> Option<(Floor, (usize, usize))> {
    let digits: u16 = text[start..end].parse().ok()?;
    let floor = catalog.floor(digits)?;

    // Right boundary: end of text or a non-alphanumeric character.
    let mut strip_end = end;
    match text[end..].chars().next() {
        Some(c) if c.is_alphanumeric() => return None,
        Some(':') => strip_end = end + 1,
        _ => {}
    }

    // Left boundary: start of text, a non-alphanumeric character, or an
    // attached `f`/`floor` marker that is itself word-bounded.
    let mut strip_start = start;
    if let Some(before) = text[..start].chars().next_back() {
        if before.is_alphanumeric() {
            let word_start = text[..start]
                .rfind(|c: char| !c.is_alphanumeric())
                .map_or(0, |p| p + c_len(text, p));
            let marker = &text[word_start..start];
            if marker != "f" && marker != "floor" {
                return None;
            }
            strip_start = word_start;
        }
    }

    Some((floor, (strip_start, strip_end)))
}

fn c_len(text: &str, at: usize) -> usize {
    text[at..].chars().next().map_or(1, char::len_utf8)
}

/// Scan for the first boss alias in catalog order.
///
/// The roster order (then per-boss alias order) decides ties when several
/// aliases are present; a documented, deterministic but arbitrary rule.
fn find_boss(catalog: &Catalog, text: &str) -> Option<BossId> {
    for (id, entry) in catalog.bosses() {
        for alias in &entry.aliases {
            if contains_word(text, alias) {
                return Some(id);
            }
        }
    }
    None
}

/// Whole-word substring search.
///
/// A match at `[pos, pos + needle.len())` counts only when the characters
/// immediately before and after are absent or non-alphanumeric.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(needle) {
        let pos = from + offset;
        let end = pos + needle.len();

        let left_ok = haystack[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let right_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());

        if left_ok && right_ok {
            return true;
        }
        from = pos + c_len(haystack, pos);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::infernal_castle()
    }

    fn extract_names(text: &str) -> Option<(u16, String)> {
        let catalog = catalog();
        extract(&catalog, text)
            .map(|s| (s.floor.number(), catalog.boss(s.boss).name.clone()))
    }

    #[test]
    fn test_marker_prefix_and_alias() {
        assert_eq!(extract_names("F70 Frioo"), Some((70, "Frioo".to_string())));
    }

    #[test]
    fn test_floor_word_with_colon() {
        assert_eq!(
            extract_names("floor45: saitama spotted"),
            Some((45, "Paitama".to_string()))
        );
    }

    #[test]
    fn test_no_fact_present() {
        assert_eq!(extract_names("hello there"), None);
    }

    #[test]
    fn test_floor_without_boss() {
        assert_eq!(extract_names("70 is spawning soon"), None);
    }

    #[test]
    fn test_boss_without_floor() {
        assert_eq!(extract_names("gucci is up somewhere"), None);
    }

    #[test]
    fn test_unconfigured_floor_rejected() {
        assert_eq!(extract_names("F50 gucci"), None);
    }

    #[test]
    fn test_detached_floor_word() {
        assert_eq!(
            extract_names("floor 45 gucci"),
            Some((45, "Gucci".to_string()))
        );
    }

    #[test]
    fn test_digits_inside_word_rejected() {
        // "x70" is not a floor token: the prefix is not a marker.
        assert_eq!(extract_names("x70 gucci"), None);
        // "705" is not a configured floor either.
        assert_eq!(extract_names("705 gucci"), None);
    }

    #[test]
    fn test_digits_with_trailing_letters_rejected() {
        assert_eq!(extract_names("70th gucci"), None);
    }

    #[test]
    fn test_second_digit_run_can_match() {
        // The first run is not a floor; scanning continues.
        assert_eq!(
            extract_names("spotted 3 of them on f70, gucci"),
            Some((70, "Gucci".to_string()))
        );
    }

    #[test]
    fn test_alias_is_whole_word() {
        // "time" must not match inside "sometimes".
        assert_eq!(extract_names("70 sometimes empty"), None);
        // "esil" must not match inside an unrelated longer word.
        assert_eq!(extract_names("70 tesil"), None);
    }

    #[test]
    fn test_hyphen_is_a_boundary() {
        assert_eq!(
            extract_names("70 cha hae-in spotted"),
            Some((70, "Dae In".to_string()))
        );
        // Boundary on both sides of a hyphenated token.
        assert_eq!(
            extract_names("f55 anti-magma team needed"),
            Some((55, "Magma".to_string()))
        );
    }

    #[test]
    fn test_alias_case_insensitive() {
        assert_eq!(
            extract_names("F30 GODSPEED"),
            Some((30, "God Speed".to_string()))
        );
    }

    #[test]
    fn test_roster_order_breaks_ties() {
        // Both Time King and Gucci appear; Time King is earlier in the
        // roster and wins.
        assert_eq!(
            extract_names("65 time or gucci, not sure"),
            Some((65, "Time King".to_string()))
        );
    }

    #[test]
    fn test_floor_digits_do_not_leak_into_alias_scan() {
        // With "f70" stripped, no alias remains.
        assert_eq!(extract_names("f70"), None);
    }

    #[test]
    fn test_punctuation_around_alias() {
        assert_eq!(
            extract_names("40: (frioo!)"),
            Some((40, "Frioo".to_string()))
        );
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("saw gucci today", "gucci"));
        assert!(contains_word("gucci", "gucci"));
        assert!(!contains_word("guccis", "gucci"));
        assert!(!contains_word("agucci", "gucci"));
        assert!(contains_word("re-gucci", "gucci"));
        assert!(!contains_word("", "gucci"));
    }
}
