use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

use reqflow_core::{DomainError, LineItemId, PartNumber};
use reqflow_infra::service::NewOrder;
use reqflow_inventory::SnapshotRow;
use reqflow_requisitions::{
    CartLine, CollectionType, Order, OrderFilter, OrderStatus, RosterEntry, UserDetails,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub user_details: UserDetails,
    #[serde(default)]
    pub cart: Vec<CartLineRequest>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
}

impl CreateOrderRequest {
    pub fn into_new_order(self) -> Result<NewOrder, DomainError> {
        let cart = self
            .cart
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let part_number = PartNumber::parse(&line.part_number).map_err(|_| {
                    DomainError::validation(format!("cart[{idx}].partNumber is required"))
                })?;
                Ok(CartLine {
                    part_number,
                    description: line.description.trim().to_string(),
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(NewOrder {
            user_details: self.user_details,
            cart,
            category: self.category,
        })
    }
}

/// Optional body for approve/reject.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub expected_version: Option<u64>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub delivered_quantities: BTreeMap<String, i64>,
    pub expected_version: Option<u64>,
}

impl DeliveryRequest {
    pub fn line_quantities(&self) -> Result<BTreeMap<LineItemId, i64>, DomainError> {
        self.delivered_quantities
            .iter()
            .map(|(raw, qty)| {
                let id: LineItemId = raw.parse().map_err(|_| {
                    DomainError::validation(format!("deliveredQuantities key '{raw}' is not a line item id"))
                })?;
                Ok((id, *qty))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    #[serde(default)]
    pub scanned_id: String,
    #[serde(rename = "type")]
    pub collection_type: Option<CollectionType>,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRowRequest {
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
}

pub fn snapshot_rows(rows: Vec<SnapshotRowRequest>) -> Result<Vec<SnapshotRow>, DomainError> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let part_number = PartNumber::parse(&row.part_number)
                .map_err(|_| DomainError::validation(format!("rows[{idx}].partNumber is required")))?;
            Ok(SnapshotRow {
                part_number,
                description: row.description.trim().to_string(),
                quantity: row.quantity,
            })
        })
        .collect()
}

/// Roster uploads tolerate missing fields; such rows are dropped on load.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRowRequest {
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub id_number: String,
    #[serde(default)]
    pub name: String,
}

impl From<RosterRowRequest> for RosterEntry {
    fn from(row: RosterRowRequest) -> Self {
        RosterEntry {
            card_number: row.card_number,
            id_number: row.id_number,
            name: row.name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    /// `YYYY-MM-DD`, matched against the requested date.
    pub date: Option<String>,
}

impl ListOrdersQuery {
    /// Blank values and `status=all` mean "no filter".
    pub fn into_filter(self) -> Result<OrderFilter, DomainError> {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let status = match non_blank(self.status) {
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(s.parse::<OrderStatus>()?),
            None => None,
        };

        let category = non_blank(self.category).filter(|c| !c.eq_ignore_ascii_case("all"));

        let date = non_blank(self.date)
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .map_err(|_| DomainError::validation(format!("date '{d}' must be YYYY-MM-DD")))
            })
            .transpose()?;

        Ok(OrderFilter {
            status,
            category,
            date,
        })
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn order_to_json(order: &Order) -> serde_json::Value {
    use reqflow_core::AggregateRoot;

    serde_json::json!({
        "id": order.id_typed().to_string(),
        "number": order.number(),
        "status": order.status(),
        "userDetails": order.user_details(),
        "category": order.category(),
        "lineItems": order.line_items(),
        "deliveredItems": order.delivered_items(),
        "collectionHistory": order.collection_history(),
        "createdAt": order.created_at().map(|t| t.to_rfc3339()),
        "updatedAt": order.updated_at().map(|t| t.to_rfc3339()),
        "version": order.version(),
    })
}
