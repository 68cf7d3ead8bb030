//! Authoritative per-part on-hand quantities.
//!
//! The ledger is replaced wholesale by inventory snapshots and decremented
//! piecemeal by deliveries. Quantities never go below zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use reqflow_core::{DomainError, PartNumber};

use crate::catalog::Catalog;

/// One parsed row from an inventory feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow {
    pub part_number: PartNumber,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLedgerEntry {
    pub part_number: PartNumber,
    pub description: String,
    pub current_quantity: i64,
}

/// Result of a single ledger decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// The part is tracked (possibly just created at zero); quantity moved
    /// from `previous` to `current`.
    Applied { previous: i64, current: i64 },
    /// The part is neither tracked nor in the catalog; nothing changed.
    Untracked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLedger {
    entries: BTreeMap<PartNumber, StockLedgerEntry>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole ledger with `rows`.
    ///
    /// Afterwards the ledger holds exactly the parts in `rows`; anything
    /// tracked before but absent now is dropped. Repeated rows for one part
    /// are summed, keeping the first non-empty description. Validation runs
    /// before any mutation, so a rejected snapshot leaves the ledger intact.
    ///
    /// Returns the number of distinct parts loaded.
    pub fn load_snapshot(
        &mut self,
        rows: impl IntoIterator<Item = SnapshotRow>,
    ) -> Result<usize, DomainError> {
        let mut next: BTreeMap<PartNumber, StockLedgerEntry> = BTreeMap::new();

        for row in rows {
            if row.quantity < 0 {
                return Err(DomainError::validation(format!(
                    "snapshot quantity for {} must be >= 0 (got {})",
                    row.part_number, row.quantity
                )));
            }

            match next.get_mut(&row.part_number) {
                Some(existing) => {
                    existing.current_quantity = existing
                        .current_quantity
                        .checked_add(row.quantity)
                        .ok_or_else(|| {
                            DomainError::validation(format!(
                                "snapshot quantity for {} overflows",
                                row.part_number
                            ))
                        })?;
                    if existing.description.is_empty() {
                        existing.description = row.description;
                    }
                }
                None => {
                    next.insert(
                        row.part_number.clone(),
                        StockLedgerEntry {
                            part_number: row.part_number,
                            description: row.description,
                            current_quantity: row.quantity,
                        },
                    );
                }
            }
        }

        self.entries = next;
        Ok(self.entries.len())
    }

    /// Reduce a part's quantity by `qty`, clamping at zero.
    ///
    /// A part missing from the ledger but present in `catalog` is first
    /// tracked at zero (so the decrement itself changes nothing). A part in
    /// neither is reported as [`DecrementOutcome::Untracked`].
    pub fn decrement(
        &mut self,
        part_number: &PartNumber,
        qty: i64,
        catalog: &Catalog,
    ) -> Result<DecrementOutcome, DomainError> {
        if qty < 0 {
            return Err(DomainError::validation(format!(
                "decrement for {part_number} must be >= 0 (got {qty})"
            )));
        }

        if !self.entries.contains_key(part_number) {
            let Some(product) = catalog.get(part_number) else {
                return Ok(DecrementOutcome::Untracked);
            };
            self.entries.insert(
                part_number.clone(),
                StockLedgerEntry {
                    part_number: part_number.clone(),
                    description: product.description.clone(),
                    current_quantity: 0,
                },
            );
        }

        let Some(entry) = self.entries.get_mut(part_number) else {
            return Ok(DecrementOutcome::Untracked);
        };
        let previous = entry.current_quantity;
        entry.current_quantity = previous.saturating_sub(qty).max(0);

        if previous < qty {
            tracing::debug!(
                part_number = %part_number,
                previous,
                requested = qty,
                "decrement clamped at zero"
            );
        }

        Ok(DecrementOutcome::Applied {
            previous,
            current: entry.current_quantity,
        })
    }

    /// Current quantity; untracked parts read as zero.
    pub fn quantity_of(&self, part_number: &PartNumber) -> i64 {
        self.entries
            .get(part_number)
            .map(|e| e.current_quantity)
            .unwrap_or(0)
    }

    pub fn get(&self, part_number: &PartNumber) -> Option<&StockLedgerEntry> {
        self.entries.get(part_number)
    }

    pub fn contains(&self, part_number: &PartNumber) -> bool {
        self.entries.contains_key(part_number)
    }

    /// Entries in part-number order.
    pub fn entries(&self) -> impl Iterator<Item = &StockLedgerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
