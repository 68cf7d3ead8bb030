//! Requisition domain module (event-sourced orders).
//!
//! Business rules for the order workflow: submission, approval, cumulative
//! delivery reconciliation and proof-of-collection. Deterministic domain logic
//! only (no IO, no HTTP, no storage).

pub mod collection;
pub mod delivery;
pub mod lifecycle;
pub mod order;
pub mod query;

pub use collection::{
    CollectionEvent, CollectionType, Roster, RosterEntry, decide_collection_type, resolve_collector,
};
pub use delivery::{DeliveryOutcome, StockDecrement, reconcile_delivery};
pub use lifecycle::{CartLine, OrderStatus, UserDetails};
pub use order::{
    ApproveOrder, CollectionRecorded, CreateOrder, DeliveredItem, DeliveryRecorded, LineItem,
    Order, OrderApproved, OrderCommand, OrderCreated, OrderEvent, OrderId, OrderRejected,
    RecordCollection, RecordDelivery, RejectOrder,
};
pub use query::{OrderFilter, OrderSummary};
