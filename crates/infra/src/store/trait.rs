use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use reqflow_core::{AggregateId, DomainError, ExpectedVersion};
use reqflow_inventory::StockLedger;
use std::sync::Arc;

/// An event ready to be appended (no sequence number yet).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// serializes the payload and captures the metadata needed to decode it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event with its position in the aggregate stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// 1-based, gap-free, per stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn to_envelope(&self) -> reqflow_events::EventEnvelope<JsonValue> {
        reqflow_events::EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.event_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Storage-level failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("payload serialization failed: {0}")]
    Serialization(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DomainError::conflict(msg),
            other => DomainError::storage(other.to_string()),
        }
    }
}

/// Staged view handed to a unit of work.
///
/// Reads observe the unit's own staged writes. Nothing becomes visible to
/// other callers until the enclosing [`RequisitionStore::transact`] returns
/// `Ok`; on `Err` every staged write is discarded.
pub trait StoreTransaction {
    /// Full stream for one aggregate, in sequence order (empty if unknown).
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError>;

    /// Append to one aggregate stream under an optimistic version check.
    ///
    /// All events must target the same aggregate; sequence numbers continue
    /// from the current stream version.
    fn append(
        &mut self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    fn ledger(&self) -> &StockLedger;

    fn ledger_mut(&mut self) -> &mut StockLedger;

    /// Allocate the next human-readable order number.
    fn next_order_number(&mut self) -> u64;
}

/// Transactional storage for order streams and the stock ledger.
///
/// Order events and ledger writes made inside one [`transact`] call commit
/// together or not at all, and units of work are serialized against each
/// other, so a snapshot import can never interleave with a delivery's
/// decrements.
///
/// [`transact`]: RequisitionStore::transact
pub trait RequisitionStore: Send + Sync {
    fn transact<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, DomainError>;

    /// Committed stream for one aggregate.
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError>;

    /// Aggregate ids of one type, in creation order.
    fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>, StoreError>;

    /// Copy of the committed ledger.
    fn ledger_snapshot(&self) -> Result<StockLedger, StoreError>;
}

impl<S> RequisitionStore for Arc<S>
where
    S: RequisitionStore + ?Sized,
{
    fn transact<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, DomainError>,
    {
        (**self).transact(work)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>, StoreError> {
        (**self).aggregate_ids(aggregate_type)
    }

    fn ledger_snapshot(&self) -> Result<StockLedger, StoreError> {
        (**self).ledger_snapshot()
    }
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, StoreError>
    where
        E: reqflow_events::Event + Serialize,
    {
        let payload =
            serde_json::to_value(event).map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
