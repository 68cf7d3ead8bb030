//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate stream inside a unit of work
//!   ↓
//! 2. Rehydrate (apply history to a fresh aggregate)
//!   ↓
//! 3. Handle (pure decision, produces events)
//!   ↓
//! 4. Append with an exact-version check, plus any ledger writes in the same unit
//!   ↓
//! 5. Commit, then publish committed events to the bus
//! ```
//!
//! Publication happens strictly after commit and is best effort: a bus
//! failure is logged and never turns a committed command into an error.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use reqflow_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use reqflow_events::{EventBus, EventEnvelope};

use crate::store::{RequisitionStore, StoreError, StoreTransaction, StoredEvent, UncommittedEvent};

/// Result of one command: the rehydrated aggregate with the new events
/// applied, plus what was appended.
#[derive(Debug)]
pub struct Dispatched<A: Aggregate> {
    pub aggregate: A,
    pub events: Vec<A::Event>,
    pub committed: Vec<StoredEvent>,
}

/// Handle on an open unit of work.
///
/// Commands dispatched through it and writes made via [`UnitOfWork::tx`]
/// commit together.
pub struct UnitOfWork<'a> {
    tx: &'a mut dyn StoreTransaction,
    committed: Vec<StoredEvent>,
}

impl<'a> UnitOfWork<'a> {
    fn new(tx: &'a mut dyn StoreTransaction) -> Self {
        Self {
            tx,
            committed: Vec::new(),
        }
    }

    pub fn tx(&mut self) -> &mut (dyn StoreTransaction + 'a) {
        &mut *self.tx
    }

    /// Rehydrate `aggregate_id` as of this unit of work.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<(A, u64), DomainError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.tx.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let version = stream_version(&history);

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok((aggregate, version))
    }

    /// Load, decide and append one command.
    ///
    /// `expected` is the caller's view of the stream version; when given and
    /// stale the command is refused with `Conflict` before it is handled. The
    /// append itself always checks the version loaded here.
    pub fn dispatch<A>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        expected: Option<u64>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DomainError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: reqflow_events::Event + Serialize + DeserializeOwned,
    {
        let (mut aggregate, current) = self.load(aggregate_id, make_aggregate)?;

        if let Some(expected) = expected {
            ExpectedVersion::Exact(expected).check(current)?;
        }

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(Dispatched {
                aggregate,
                events: decided,
                committed: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self
            .tx
            .append(uncommitted, ExpectedVersion::Exact(current))?;

        for ev in &decided {
            aggregate.apply(ev);
        }
        self.committed.extend(committed.iter().cloned());

        Ok(Dispatched {
            aggregate,
            events: decided,
            committed,
        })
    }
}

/// Reusable command execution engine over a [`RequisitionStore`] and an
/// [`EventBus`].
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: RequisitionStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `work` as one atomic unit, then publish what it committed.
    pub fn execute<T>(
        &self,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let (value, committed) = self.store.transact(|tx| {
            let mut unit = UnitOfWork::new(tx);
            let value = work(&mut unit)?;
            Ok((value, unit.committed))
        })?;

        self.publish(&committed);
        Ok(value)
    }

    /// Single-command convenience over [`execute`](Self::execute).
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        expected: Option<u64>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DomainError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: reqflow_events::Event + Serialize + DeserializeOwned,
    {
        self.execute(|unit| {
            unit.dispatch(aggregate_id, aggregate_type, expected, command, make_aggregate)
        })
    }

    /// Rehydrate from committed state, outside any unit of work.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<(A, u64), DomainError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let version = stream_version(&history);

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok((aggregate, version))
    }

    fn publish(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(err) = self.bus.publish(stored.to_envelope()) {
                tracing::warn!(
                    event_id = %stored.event_id,
                    event_type = %stored.event_type,
                    aggregate_id = %stored.aggregate_id,
                    error = ?err,
                    "event publication failed after commit"
                );
            }
        }
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), StoreError> {
    // A backend must never hand back another stream's events or reorder them.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(StoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(StoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DomainError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::storage(format!(
                "cannot decode {} #{}: {e}",
                stored.event_type, stored.sequence_number
            ))
        })?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use reqflow_core::{AggregateRoot, LineItemId, PartNumber};
    use reqflow_events::InMemoryEventBus;
    use reqflow_requisitions::{
        ApproveOrder, CreateOrder, LineItem, Order, OrderCommand, OrderId, OrderStatus, UserDetails,
    };

    use crate::store::InMemoryRequisitionStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn setup() -> (CommandDispatcher<InMemoryRequisitionStore, Bus>, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        (CommandDispatcher::new(InMemoryRequisitionStore::new(), bus.clone()), bus)
    }

    fn create(id: AggregateId) -> OrderCommand {
        OrderCommand::CreateOrder(CreateOrder {
            order_id: OrderId::new(id),
            number: 1001,
            user_details: UserDetails {
                name: "Jane".into(),
                emp_id: "E123".into(),
                dept: "Maintenance".into(),
                zone: "Z1".into(),
                group: None,
                requested_date: None,
            },
            category: None,
            line_items: vec![LineItem {
                id: LineItemId::new(),
                part_number: PartNumber::parse("P1").unwrap(),
                description: "Bolt".into(),
                quantity_requested: 5,
            }],
            occurred_at: Utc::now(),
        })
    }

    fn approve(id: AggregateId) -> OrderCommand {
        OrderCommand::ApproveOrder(ApproveOrder {
            order_id: OrderId::new(id),
            occurred_at: Utc::now(),
        })
    }

    fn make(id: AggregateId) -> Order {
        Order::empty(OrderId::new(id))
    }

    #[test]
    fn dispatch_persists_applies_and_publishes() {
        let (dispatcher, bus) = setup();
        let sub = bus.subscribe();
        let id = AggregateId::new();

        let out = dispatcher
            .dispatch(id, "requisitions.order", None, create(id), make)
            .unwrap();
        assert_eq!(out.aggregate.version(), 1);
        assert_eq!(out.committed[0].sequence_number, 1);

        let out = dispatcher
            .dispatch(id, "requisitions.order", Some(1), approve(id), make)
            .unwrap();
        assert_eq!(out.aggregate.status(), OrderStatus::Approved);

        let published = sub.drain();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].event_type(), "requisitions.order.approved");
    }

    #[test]
    fn stale_expected_version_is_refused_before_handling() {
        let (dispatcher, bus) = setup();
        let sub = bus.subscribe();
        let id = AggregateId::new();
        dispatcher
            .dispatch(id, "requisitions.order", None, create(id), make)
            .unwrap();
        sub.drain();

        let err = dispatcher
            .dispatch(id, "requisitions.order", Some(0), approve(id), make)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(sub.drain().is_empty());

        let (order, version) = dispatcher.load(id, make).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(version, 1);
    }

    #[test]
    fn rejected_command_publishes_nothing() {
        let (dispatcher, bus) = setup();
        let sub = bus.subscribe();
        let id = AggregateId::new();

        let err = dispatcher
            .dispatch(id, "requisitions.order", None, approve(id), make)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert!(sub.drain().is_empty());
        assert!(dispatcher.store().load_stream(id).unwrap().is_empty());
    }

    #[test]
    fn failure_later_in_a_unit_rolls_back_earlier_commands() {
        let (dispatcher, bus) = setup();
        let sub = bus.subscribe();
        let id = AggregateId::new();

        let result: Result<(), DomainError> = dispatcher.execute(|unit| {
            unit.dispatch(id, "requisitions.order", None, create(id), make)?;
            Err(DomainError::storage("disk full"))
        });

        assert!(result.is_err());
        assert!(sub.drain().is_empty());
        assert!(!dispatcher.load(id, make).unwrap().0.exists());
    }

    #[test]
    fn foreign_events_in_a_stream_are_refused() {
        let id = AggregateId::new();
        let stream = vec![StoredEvent {
            event_id: Uuid::now_v7(),
            aggregate_id: AggregateId::new(),
            aggregate_type: "requisitions.order".into(),
            sequence_number: 1,
            event_type: "x".into(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: JsonValue::Null,
        }];
        assert!(validate_loaded_stream(id, &stream).is_err());
    }
}
