//! Requisition application service.
//!
//! Wires the `Order` aggregate, the stock ledger and the collaborators
//! (catalog, roster) into the operations exposed over HTTP. Each mutating
//! operation is one unit of work: order events and the ledger decrements they
//! imply commit together.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;

use reqflow_core::{AggregateId, DomainError, LineItemId};
use reqflow_events::{EventBus, EventEnvelope};
use reqflow_inventory::{
    Catalog, DecrementOutcome, ReorderItem, SnapshotRow, StockLedgerEntry, compute_reorder_list,
};
use reqflow_requisitions::{
    ApproveOrder, CartLine, CollectionEvent, CollectionType, CreateOrder, DeliveredItem,
    LineItem, Order, OrderCommand, OrderEvent, OrderFilter, OrderId, OrderStatus, OrderSummary,
    RecordCollection, RecordDelivery, RejectOrder, Roster, StockDecrement, UserDetails,
    resolve_collector,
};

use crate::command_dispatcher::{CommandDispatcher, UnitOfWork};
use crate::store::RequisitionStore;

pub const ORDER_AGGREGATE: &str = "requisitions.order";

/// A submission as received from the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_details: UserDetails,
    pub cart: Vec<CartLine>,
    pub category: Option<String>,
}

/// Outcome of one delivery submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub status: OrderStatus,
    pub delivered_items: Vec<DeliveredItem>,
    /// Ledger decrements applied by this submission (empty on a resubmission).
    pub decrements: Vec<StockDecrement>,
    pub version: u64,
}

pub struct RequisitionService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    catalog: Arc<Catalog>,
    roster: Arc<dyn Roster>,
}

fn make_order(id: AggregateId) -> Order {
    Order::empty(OrderId::new(id))
}

impl<S, B> RequisitionService<S, B>
where
    S: RequisitionStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: CommandDispatcher<S, B>, catalog: Arc<Catalog>, roster: Arc<dyn Roster>) -> Self {
        Self {
            dispatcher,
            catalog,
            roster,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    /// Submit a new order. It starts `Pending` with a fresh order number.
    pub fn create_order(&self, new_order: NewOrder) -> Result<Order, DomainError> {
        let order_id = OrderId::new(AggregateId::new());
        let line_items: Vec<LineItem> = new_order
            .cart
            .into_iter()
            .map(|line| LineItem {
                id: LineItemId::new(),
                part_number: line.part_number,
                description: line.description,
                quantity_requested: line.quantity,
            })
            .collect();

        let order = self.dispatcher.execute(|unit| {
            let number = unit.tx().next_order_number();
            let command = OrderCommand::CreateOrder(CreateOrder {
                order_id,
                number,
                user_details: new_order.user_details,
                category: new_order.category,
                line_items,
                occurred_at: Utc::now(),
            });
            Ok(unit
                .dispatch(order_id.0, ORDER_AGGREGATE, None, command, make_order)?
                .aggregate)
        })?;

        tracing::info!(
            order_id = %order_id,
            number = order.number(),
            lines = order.line_items().len(),
            "order submitted"
        );
        Ok(order)
    }

    pub fn approve(&self, order_id: OrderId, expected: Option<u64>) -> Result<Order, DomainError> {
        let command = OrderCommand::ApproveOrder(ApproveOrder {
            order_id,
            occurred_at: Utc::now(),
        });
        let order = self
            .dispatcher
            .dispatch(order_id.0, ORDER_AGGREGATE, expected, command, make_order)?
            .aggregate;

        tracing::info!(order_id = %order_id, "order approved");
        Ok(order)
    }

    pub fn reject(
        &self,
        order_id: OrderId,
        reason: Option<String>,
        expected: Option<u64>,
    ) -> Result<Order, DomainError> {
        let command = OrderCommand::RejectOrder(RejectOrder {
            order_id,
            reason,
            occurred_at: Utc::now(),
        });
        let order = self
            .dispatcher
            .dispatch(order_id.0, ORDER_AGGREGATE, expected, command, make_order)?
            .aggregate;

        tracing::info!(order_id = %order_id, "order rejected");
        Ok(order)
    }

    /// Record cumulative delivered totals and take the deltas out of stock.
    ///
    /// Resubmitting totals that are already recorded appends nothing and
    /// leaves the ledger as it is.
    pub fn record_delivery(
        &self,
        order_id: OrderId,
        delivered_quantities: BTreeMap<LineItemId, i64>,
        expected: Option<u64>,
    ) -> Result<DeliveryReceipt, DomainError> {
        let command = OrderCommand::RecordDelivery(RecordDelivery {
            order_id,
            delivered_quantities,
            occurred_at: Utc::now(),
        });

        let receipt = self.dispatcher.execute(|unit| {
            let dispatched =
                unit.dispatch(order_id.0, ORDER_AGGREGATE, expected, command, make_order)?;

            let decrements: Vec<StockDecrement> = dispatched
                .events
                .iter()
                .filter_map(|ev| match ev {
                    OrderEvent::DeliveryRecorded(e) => Some(e.decrements.clone()),
                    _ => None,
                })
                .flatten()
                .collect();

            self.apply_decrements(unit, order_id, &decrements)?;

            Ok(DeliveryReceipt {
                status: dispatched.aggregate.status(),
                delivered_items: dispatched.aggregate.delivered_items().to_vec(),
                decrements,
                version: reqflow_core::AggregateRoot::version(&dispatched.aggregate),
            })
        })?;

        if receipt.decrements.is_empty() {
            tracing::debug!(order_id = %order_id, "delivery resubmission changed nothing");
        } else {
            tracing::info!(
                order_id = %order_id,
                status = %receipt.status,
                decrements = receipt.decrements.len(),
                "delivery recorded"
            );
        }
        Ok(receipt)
    }

    fn apply_decrements(
        &self,
        unit: &mut UnitOfWork<'_>,
        order_id: OrderId,
        decrements: &[StockDecrement],
    ) -> Result<(), DomainError> {
        for d in decrements {
            match unit
                .tx()
                .ledger_mut()
                .decrement(&d.part_number, d.quantity, &self.catalog)?
            {
                DecrementOutcome::Applied { previous, current } => {
                    tracing::debug!(
                        order_id = %order_id,
                        part_number = %d.part_number,
                        delta = d.quantity,
                        previous,
                        current,
                        "stock decremented"
                    );
                }
                DecrementOutcome::Untracked => {
                    tracing::warn!(
                        order_id = %order_id,
                        part_number = %d.part_number,
                        delta = d.quantity,
                        "delivered part is neither stocked nor catalogued; ledger unchanged"
                    );
                }
            }
        }
        Ok(())
    }

    /// Record a pickup against a delivered (or partly delivered) order.
    ///
    /// `scanned_id` is resolved through the roster; unknown cards are recorded
    /// verbatim.
    pub fn record_collection(
        &self,
        order_id: OrderId,
        scanned_id: &str,
        collection_type: Option<CollectionType>,
        expected: Option<u64>,
    ) -> Result<CollectionEvent, DomainError> {
        let collected_by = resolve_collector(self.roster.as_ref(), scanned_id)?;
        let command = OrderCommand::RecordCollection(RecordCollection {
            order_id,
            collected_by,
            collection_type,
            occurred_at: Utc::now(),
        });

        let order = self
            .dispatcher
            .dispatch(order_id.0, ORDER_AGGREGATE, expected, command, make_order)?
            .aggregate;

        let event = order
            .collection_history()
            .last()
            .cloned()
            .ok_or_else(|| DomainError::storage(format!("collection on {order_id} was not applied")))?;

        tracing::info!(
            order_id = %order_id,
            collected_by = %event.collected_by,
            collection_type = %event.collection_type,
            "collection recorded"
        );
        Ok(event)
    }

    pub fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let (order, _) = self.dispatcher.load(order_id.0, make_order)?;
        if !order.exists() {
            return Err(DomainError::not_found(format!("order {order_id}")));
        }
        Ok(order)
    }

    /// Orders matching `filter`, oldest first.
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, DomainError> {
        let ids = self.dispatcher.store().aggregate_ids(ORDER_AGGREGATE)?;
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            let (order, _) = self.dispatcher.load(id, make_order)?;
            if order.exists() && filter.matches(&order) {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    pub fn summary(&self) -> Result<OrderSummary, DomainError> {
        let orders = self.list_orders(&OrderFilter::default())?;
        Ok(OrderSummary::tally(&orders))
    }

    /// Replace the whole ledger with a fresh stock count.
    pub fn load_stock_snapshot(&self, rows: Vec<SnapshotRow>) -> Result<usize, DomainError> {
        let parts = self
            .dispatcher
            .execute(|unit| unit.tx().ledger_mut().load_snapshot(rows))?;

        tracing::info!(parts, "stock snapshot loaded");
        Ok(parts)
    }

    pub fn stock(&self) -> Result<Vec<StockLedgerEntry>, DomainError> {
        let ledger = self.dispatcher.store().ledger_snapshot()?;
        Ok(ledger.entries().cloned().collect())
    }

    pub fn reorder_list(&self) -> Result<Vec<ReorderItem>, DomainError> {
        let ledger = self.dispatcher.store().ledger_snapshot()?;
        Ok(compute_reorder_list(&ledger, &self.catalog))
    }
}
