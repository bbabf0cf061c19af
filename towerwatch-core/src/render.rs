//! Rendering a board snapshot into publishable text.
//!
//! Rendering is pure and deterministic: the output is fully determined by
//! the snapshot and the supplied timestamp. The scheduler relies on this
//! to compare fresh output against the last published content and skip
//! byte-identical edits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::catalog::{BossId, Catalog, Floor};

/// Presentation configuration for the status board.
#[derive(Debug, Clone)]
pub struct BoardStyle {
    /// Banner line at the top of the board.
    pub header: String,
    /// Line rendered for floors with no resolved boss.
    pub placeholder: String,
    /// Optional mention string prepended on its own line (e.g. a role
    /// ping).
    pub mention: Option<String>,
    /// Trailing lines after the timestamp.
    pub footer: Vec<String>,
    /// Width of the separator rules around the floor list.
    pub separator_width: usize,
}

impl BoardStyle {
    /// Plain style: banner, loading placeholder, no mention, no footer.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            placeholder: "⏳ *Loading*".to_string(),
            mention: None,
            footer: Vec::new(),
            separator_width: 35,
        }
    }

    /// The production Infernal Castle board style.
    pub fn infernal_castle() -> Self {
        Self::new("**INFERNAL CASTLE SPAWNED**").with_footer_line("***In Spiderman we trust*** 🕷️")
    }

    pub fn with_mention(mut self, mention: impl Into<String>) -> Self {
        self.mention = Some(mention.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_footer_line(mut self, line: impl Into<String>) -> Self {
        self.footer.push(line.into());
        self
    }
}

/// Render the status board.
///
/// Floors iterate in ascending numeric order (the snapshot is keyed by
/// `Floor`, which orders numerically). `now` should already carry the
/// display offset; no other time source is consulted.
pub fn render_report(
    catalog: &Catalog,
    style: &BoardStyle,
    snapshot: &BTreeMap<Floor, Option<BossId>>,
    now: DateTime<Utc>,
) -> String {
    let separator = "─".repeat(style.separator_width);
    let mut lines = Vec::with_capacity(snapshot.len() + 8);

    if let Some(mention) = &style.mention {
        lines.push(mention.clone());
    }
    lines.push(style.header.clone());
    lines.push(separator.clone());

    for (floor, resolved) in snapshot {
        match resolved {
            Some(boss) => {
                let entry = catalog.boss(*boss);
                lines.push(format!(
                    "**Floor {floor}** - {} **{}**",
                    entry.glyph, entry.name
                ));
            }
            None => lines.push(format!("**Floor {floor}** - {}", style.placeholder)),
        }
    }

    lines.push(separator);
    lines.push(format!(
        "*Last updated: {} - {}*",
        now.format("%H:%M"),
        now.format("%d %b")
    ));
    lines.extend(style.footer.iter().cloned());

    lines.join("\n")
}
