//! Card roster backing proof-of-collection lookups.

use std::collections::HashMap;
use std::sync::RwLock;

use reqflow_requisitions::{Roster, RosterEntry};

/// Roster held in memory, replaced wholesale on each upload.
///
/// Lookups match the card number exactly after trimming.
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    entries: RwLock<HashMap<String, RosterEntry>>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster. Rows missing a card number, id number or name are
    /// dropped; a later row for the same card wins.
    ///
    /// Returns the number of cards now known.
    pub fn replace(&self, rows: impl IntoIterator<Item = RosterEntry>) -> usize {
        let mut next = HashMap::new();
        let mut dropped = 0usize;

        for row in rows {
            if !row.is_complete() {
                dropped += 1;
                continue;
            }
            let entry = RosterEntry {
                card_number: row.card_number.trim().to_string(),
                id_number: row.id_number.trim().to_string(),
                name: row.name.trim().to_string(),
            };
            next.insert(entry.card_number.clone(), entry);
        }

        if dropped > 0 {
            tracing::info!(dropped, "roster upload skipped incomplete rows");
        }

        let loaded = next.len();
        match self.entries.write() {
            Ok(mut entries) => *entries = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        loaded
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Roster for InMemoryRoster {
    fn lookup(&self, raw_id: &str) -> Option<RosterEntry> {
        let entries = self.entries.read().ok()?;
        entries.get(raw_id.trim()).cloned()
    }
}
