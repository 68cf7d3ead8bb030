use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LineItemId, PartNumber};
use reqflow_events::Event;

use crate::collection::{CollectionEvent, CollectionType, decide_collection_type};
use crate::delivery::{StockDecrement, reconcile_delivery};
use crate::lifecycle::{OrderStatus, UserDetails};

/// Requisition order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A requested part + quantity within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: LineItemId,
    pub part_number: PartNumber,
    pub description: String,
    pub quantity_requested: i64,
}

/// Cumulative delivered total for one line, as of the latest submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredItem {
    pub line_item_id: LineItemId,
    pub part_number: PartNumber,
    pub delivered_qty: i64,
    pub delivery_timestamp: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    number: u64,
    status: OrderStatus,
    user_details: UserDetails,
    category: String,
    line_items: Vec<LineItem>,
    delivered_items: Vec<DeliveredItem>,
    collection_history: Vec<CollectionEvent>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            number: 0,
            status: OrderStatus::Pending,
            user_details: UserDetails::default(),
            category: String::new(),
            line_items: Vec::new(),
            delivered_items: Vec::new(),
            collection_history: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn user_details(&self) -> &UserDetails {
        &self.user_details
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn delivered_items(&self) -> &[DeliveredItem] {
        &self.delivered_items
    }

    pub fn collection_history(&self) -> &[CollectionEvent] {
        &self.collection_history
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn has_full_collection(&self) -> bool {
        self.collection_history
            .iter()
            .any(|e| e.collection_type == CollectionType::Full)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder. Line ids are assigned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub number: u64,
    pub user_details: UserDetails,
    pub category: Option<String>,
    pub line_items: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectOrder {
    pub order_id: OrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordDelivery. `delivered_quantities` holds cumulative totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelivery {
    pub order_id: OrderId,
    pub delivered_quantities: BTreeMap<LineItemId, i64>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCollection. `collected_by` is already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCollection {
    pub order_id: OrderId,
    pub collected_by: String,
    pub collection_type: Option<CollectionType>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    ApproveOrder(ApproveOrder),
    RejectOrder(RejectOrder),
    RecordDelivery(RecordDelivery),
    RecordCollection(RecordCollection),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub number: u64,
    pub user_details: UserDetails,
    pub category: String,
    pub line_items: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderApproved {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub order_id: OrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryRecorded.
///
/// Carries the new authoritative totals and the ledger decrements committed
/// with them, so the stream alone explains every stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecorded {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub delivered_items: Vec<DeliveredItem>,
    pub decrements: Vec<StockDecrement>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecorded {
    pub order_id: OrderId,
    pub collected_by: String,
    pub collection_type: CollectionType,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    OrderApproved(OrderApproved),
    OrderRejected(OrderRejected),
    DeliveryRecorded(DeliveryRecorded),
    CollectionRecorded(CollectionRecorded),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "requisitions.order.created",
            OrderEvent::OrderApproved(_) => "requisitions.order.approved",
            OrderEvent::OrderRejected(_) => "requisitions.order.rejected",
            OrderEvent::DeliveryRecorded(_) => "requisitions.order.delivery_recorded",
            OrderEvent::CollectionRecorded(_) => "requisitions.order.collection_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::OrderApproved(e) => e.occurred_at,
            OrderEvent::OrderRejected(e) => e.occurred_at,
            OrderEvent::DeliveryRecorded(e) => e.occurred_at,
            OrderEvent::CollectionRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.number = e.number;
                self.status = OrderStatus::Pending;
                self.user_details = e.user_details.clone();
                self.category = e.category.clone();
                self.line_items = e.line_items.clone();
                self.delivered_items.clear();
                self.collection_history.clear();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderApproved(_) => {
                self.status = OrderStatus::Approved;
            }
            OrderEvent::OrderRejected(_) => {
                self.status = OrderStatus::Rejected;
            }
            OrderEvent::DeliveryRecorded(e) => {
                self.status = e.status;
                self.delivered_items = e.delivered_items.clone();
            }
            OrderEvent::CollectionRecorded(e) => {
                self.collection_history.push(CollectionEvent {
                    collected_by: e.collected_by.clone(),
                    collection_type: e.collection_type,
                    timestamp: e.occurred_at,
                });
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::ApproveOrder(cmd) => self.handle_approve(cmd),
            OrderCommand::RejectOrder(cmd) => self.handle_reject(cmd),
            OrderCommand::RecordDelivery(cmd) => self.handle_delivery(cmd),
            OrderCommand::RecordCollection(cmd) => self.handle_collection(cmd),
        }
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("order {order_id}")));
        }
        if self.id != order_id {
            return Err(DomainError::validation(format!(
                "command targets order {order_id} but was routed to {}",
                self.id
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("order {} already exists", cmd.order_id)));
        }
        cmd.user_details.validate()?;

        if cmd.line_items.is_empty() {
            return Err(DomainError::validation("cart cannot be empty"));
        }

        let mut seen = HashSet::new();
        for line in &cmd.line_items {
            if line.quantity_requested <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for {} must be positive (got {})",
                    line.part_number, line.quantity_requested
                )));
            }
            if !seen.insert(line.id) {
                return Err(DomainError::validation(format!(
                    "duplicate line item id {}",
                    line.id
                )));
            }
        }

        let category = cmd
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("Unknown")
            .to_string();

        let mut user_details = cmd.user_details.clone();
        user_details
            .requested_date
            .get_or_insert(cmd.occurred_at.date_naive());

        Ok(vec![OrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            number: cmd.number,
            user_details,
            category,
            line_items: cmd.line_items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.status.ensure_transition(OrderStatus::Approved)?;

        Ok(vec![OrderEvent::OrderApproved(OrderApproved {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;
        self.status.ensure_transition(OrderStatus::Rejected)?;

        Ok(vec![OrderEvent::OrderRejected(OrderRejected {
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delivery(&self, cmd: &RecordDelivery) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if !self.status.accepts_delivery() {
            return Err(DomainError::invalid_state(format!(
                "deliveries require an Approved or Partial order (status is {})",
                self.status
            )));
        }

        let outcome = reconcile_delivery(
            &self.line_items,
            &self.delivered_items,
            &cmd.delivered_quantities,
            cmd.occurred_at,
        )?;

        // Resubmitting the recorded totals changes nothing.
        if !outcome.changed && outcome.status == self.status {
            return Ok(vec![]);
        }
        self.status.ensure_transition(outcome.status)?;

        Ok(vec![OrderEvent::DeliveryRecorded(DeliveryRecorded {
            order_id: cmd.order_id,
            status: outcome.status,
            delivered_items: outcome.delivered_items,
            decrements: outcome.decrements,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_collection(&self, cmd: &RecordCollection) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if cmd.collected_by.trim().is_empty() {
            return Err(DomainError::validation("collectedBy cannot be empty"));
        }
        let collection_type =
            decide_collection_type(self.status, &self.collection_history, cmd.collection_type)?;

        Ok(vec![OrderEvent::CollectionRecorded(CollectionRecorded {
            order_id: cmd.order_id,
            collected_by: cmd.collected_by.trim().to_string(),
            collection_type,
            occurred_at: cmd.occurred_at,
        })])
    }
}
