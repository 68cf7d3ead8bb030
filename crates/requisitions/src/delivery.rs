//! Delivery reconciliation.
//!
//! A delivery submission is the authoritative cumulative total for each line,
//! not an increment. Reconciling it against what was recorded before yields the
//! new delivered totals, the resulting status and the per-line *deltas* to take
//! out of the stock ledger. Passing deltas rather than totals is what makes a
//! resubmission of the same figures leave the ledger untouched.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::{DomainError, LineItemId, PartNumber};

use crate::lifecycle::OrderStatus;
use crate::order::{DeliveredItem, LineItem};

/// Ledger decrement instruction produced by a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDecrement {
    pub line_item_id: LineItemId,
    pub part_number: PartNumber,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub status: OrderStatus,
    /// New authoritative totals, one per line item, in line order.
    pub delivered_items: Vec<DeliveredItem>,
    /// Positive deltas only.
    pub decrements: Vec<StockDecrement>,
    /// False when every total equals what was already recorded.
    pub changed: bool,
}

/// Reconcile a cumulative delivery submission.
///
/// Lines absent from `submitted` keep their previously recorded total (zero if
/// none). Keys that name no line of the order, and totals outside
/// `0..=quantity_requested`, are validation failures.
pub fn reconcile_delivery(
    line_items: &[LineItem],
    previous: &[DeliveredItem],
    submitted: &BTreeMap<LineItemId, i64>,
    occurred_at: DateTime<Utc>,
) -> Result<DeliveryOutcome, DomainError> {
    if let Some(unknown) = submitted
        .keys()
        .find(|id| !line_items.iter().any(|line| line.id == **id))
    {
        return Err(DomainError::validation(format!(
            "deliveredQuantities references unknown line item {unknown}"
        )));
    }

    let recorded: HashMap<LineItemId, &DeliveredItem> =
        previous.iter().map(|d| (d.line_item_id, d)).collect();

    let mut delivered_items = Vec::with_capacity(line_items.len());
    let mut decrements = Vec::new();
    let mut changed = previous.is_empty();
    let mut complete = true;

    for line in line_items {
        let prior = recorded.get(&line.id).copied();
        let previous_qty = prior.map(|d| d.delivered_qty).unwrap_or(0);
        let new_qty = submitted.get(&line.id).copied().unwrap_or(previous_qty);

        if new_qty < 0 || new_qty > line.quantity_requested {
            return Err(DomainError::validation(format!(
                "delivered quantity for line {} ({}) must be between 0 and {} (got {new_qty})",
                line.id, line.part_number, line.quantity_requested
            )));
        }

        let delta = (new_qty - previous_qty).max(0);
        tracing::debug!(
            line_item_id = %line.id,
            part_number = %line.part_number,
            previous_qty,
            new_qty,
            delta,
            "reconciled delivery line"
        );
        if delta > 0 {
            decrements.push(StockDecrement {
                line_item_id: line.id,
                part_number: line.part_number.clone(),
                quantity: delta,
            });
        }

        match prior {
            Some(existing) if existing.delivered_qty == new_qty => {
                delivered_items.push(existing.clone());
            }
            _ => {
                changed = true;
                delivered_items.push(DeliveredItem {
                    line_item_id: line.id,
                    part_number: line.part_number.clone(),
                    delivered_qty: new_qty,
                    delivery_timestamp: occurred_at,
                });
            }
        }

        complete &= new_qty == line.quantity_requested;
    }

    let status = if complete {
        OrderStatus::Delivered
    } else {
        OrderStatus::Partial
    };

    Ok(DeliveryOutcome {
        status,
        delivered_items,
        decrements,
        changed,
    })
}
