//! Active market identifiers and membership diffs.

use std::collections::HashSet;

use thiserror::Error;

use super::id::MarketId;

/// Separator between market identifiers in a staging row.
pub const MARKET_IDS_DELIMITER: char = '|';

/// A single market identifier entry that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse market ID {entry:?} as integer: {reason}")]
pub struct MarketIdParseError {
    /// The trimmed entry that failed to parse.
    pub entry: String,
    pub reason: String,
}

/// Parse a `|`-delimited list of market identifiers.
///
/// Every entry is trimmed before parsing. Entries that are not integers are
/// skipped and reported in the returned error list; the remaining entries are
/// still parsed. Input order and duplicates are preserved. An absent input
/// yields two empty lists.
#[must_use]
pub fn parse_market_ids(raw: Option<&str>) -> (Vec<MarketId>, Vec<MarketIdParseError>) {
    let mut ids = Vec::new();
    let mut errors = Vec::new();

    let Some(raw) = raw else {
        return (ids, errors);
    };

    for entry in raw.split(MARKET_IDS_DELIMITER) {
        let entry = entry.trim();
        match entry.parse::<i64>() {
            Ok(id) => ids.push(MarketId::new(id)),
            Err(e) => errors.push(MarketIdParseError {
                entry: entry.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    (ids, errors)
}

/// Membership changes needed to turn a current market set into a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketSetDelta {
    /// Markets in the new set but not the current one.
    pub to_add: Vec<MarketId>,
    /// Markets in the current set but not the new one.
    pub to_remove: Vec<MarketId>,
}

impl MarketSetDelta {
    /// Compute `new - current` and `current - new`.
    ///
    /// Each side is treated as a set: duplicates collapse and the output is
    /// sorted so that the bulk writes are deterministic.
    #[must_use]
    pub fn between(current: &[MarketId], new: &[MarketId]) -> Self {
        let current_set: HashSet<MarketId> = current.iter().copied().collect();
        let new_set: HashSet<MarketId> = new.iter().copied().collect();

        let mut to_add: Vec<MarketId> = new_set.difference(&current_set).copied().collect();
        let mut to_remove: Vec<MarketId> = current_set.difference(&new_set).copied().collect();
        to_add.sort_unstable();
        to_remove.sort_unstable();

        Self { to_add, to_remove }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
