//! Storage boundary for order streams and the stock ledger.
//!
//! - `trait.rs`: `RequisitionStore` / `StoreTransaction` contracts and event records
//! - `in_memory.rs`: lock-serialized in-memory implementation

mod r#trait;
pub mod in_memory;

pub use in_memory::InMemoryRequisitionStore;
pub use r#trait::{RequisitionStore, StoreError, StoreTransaction, StoredEvent, UncommittedEvent};
