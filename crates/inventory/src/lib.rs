//! Inventory domain module: product catalog, stock ledger and reorder signals.
//!
//! Pure, deterministic logic (no IO, no HTTP, no storage).

pub mod catalog;
pub mod ledger;
pub mod reorder;

pub use catalog::{Catalog, CatalogEntry};
pub use ledger::{DecrementOutcome, SnapshotRow, StockLedger, StockLedgerEntry};
pub use reorder::{ReorderItem, compute_reorder_list};
