use std::collections::HashMap;
use std::sync::RwLock;

use reqflow_core::{AggregateId, DomainError, ExpectedVersion};
use reqflow_inventory::StockLedger;

use super::r#trait::{
    RequisitionStore, StoreError, StoreTransaction, StoredEvent, UncommittedEvent,
};

/// Order numbers start above this value.
const ORDER_NUMBER_BASE: u64 = 1000;

#[derive(Debug)]
struct State {
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
    /// (aggregate_type, id) in first-append order.
    created: Vec<(String, AggregateId)>,
    ledger: StockLedger,
    last_order_number: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            streams: HashMap::new(),
            created: Vec::new(),
            ledger: StockLedger::new(),
            last_order_number: ORDER_NUMBER_BASE,
        }
    }
}

/// In-memory requisition store.
///
/// A single lock covers every stream and the ledger, so units of work run one
/// at a time. Writes are staged and merged only when the unit succeeds.
/// Intended for tests/dev and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryRequisitionStore {
    state: RwLock<State>,
}

impl InMemoryRequisitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-loaded ledger.
    pub fn with_ledger(ledger: StockLedger) -> Self {
        Self {
            state: RwLock::new(State {
                ledger,
                ..State::default()
            }),
        }
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

/// Staged writes of one unit of work, layered over the committed state.
struct Staged<'a> {
    base: &'a State,
    appended: HashMap<AggregateId, Vec<StoredEvent>>,
    created: Vec<(String, AggregateId)>,
    ledger: Option<StockLedger>,
    last_order_number: u64,
}

impl<'a> Staged<'a> {
    fn new(base: &'a State) -> Self {
        Self {
            base,
            appended: HashMap::new(),
            created: Vec::new(),
            ledger: None,
            last_order_number: base.last_order_number,
        }
    }

    fn committed(&self, aggregate_id: AggregateId) -> &[StoredEvent] {
        self.base
            .streams
            .get(&aggregate_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn into_writes(self) -> Writes {
        Writes {
            appended: self.appended,
            created: self.created,
            ledger: self.ledger,
            last_order_number: self.last_order_number,
        }
    }
}

struct Writes {
    appended: HashMap<AggregateId, Vec<StoredEvent>>,
    created: Vec<(String, AggregateId)>,
    ledger: Option<StockLedger>,
    last_order_number: u64,
}

impl StoreTransaction for Staged<'_> {
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError> {
        let mut stream = self.committed(aggregate_id).to_vec();
        if let Some(staged) = self.appended.get(&aggregate_id) {
            stream.extend(staged.iter().cloned());
        }
        Ok(stream)
    }

    fn append(
        &mut self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events must target the same aggregate stream.
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.aggregate_id != aggregate_id {
                return Err(StoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(StoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let committed = self.committed(aggregate_id);
        let first_type = committed.first().map(|e| e.aggregate_type.clone());
        let committed_version = InMemoryRequisitionStore::current_version(committed);

        let staged = self.appended.entry(aggregate_id).or_default();
        let current = staged
            .last()
            .map(|e| e.sequence_number)
            .unwrap_or(committed_version);

        if !expected_version.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Enforce aggregate type stability across the stream.
        let stream_type = first_type.or_else(|| staged.first().map(|e| e.aggregate_type.clone()));
        match stream_type {
            Some(existing) if existing != aggregate_type => {
                return Err(StoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{existing}', attempted append with '{aggregate_type}'"
                )));
            }
            Some(_) => {}
            None => self.created.push((aggregate_type.clone(), aggregate_id)),
        }

        let mut next = current + 1;
        let mut out = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            staged.push(stored.clone());
            out.push(stored);
        }

        Ok(out)
    }

    fn ledger(&self) -> &StockLedger {
        self.ledger.as_ref().unwrap_or(&self.base.ledger)
    }

    fn ledger_mut(&mut self) -> &mut StockLedger {
        let base = &self.base.ledger;
        self.ledger.get_or_insert_with(|| base.clone())
    }

    fn next_order_number(&mut self) -> u64 {
        self.last_order_number += 1;
        self.last_order_number
    }
}

impl RequisitionStore for InMemoryRequisitionStore {
    fn transact<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, DomainError>,
    {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let (value, writes) = {
            let mut staged = Staged::new(&state);
            let value = work(&mut staged)?;
            (value, staged.into_writes())
        };

        for (aggregate_id, events) in writes.appended {
            state.streams.entry(aggregate_id).or_default().extend(events);
        }
        state.created.extend(writes.created);
        if let Some(ledger) = writes.ledger {
            state.ledger = ledger;
        }
        state.last_order_number = writes.last_order_number;

        Ok(value)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(state.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(state
            .created
            .iter()
            .filter(|(t, _)| t == aggregate_type)
            .map(|(_, id)| *id)
            .collect())
    }

    fn ledger_snapshot(&self) -> Result<StockLedger, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(state.ledger.clone())
    }
}
