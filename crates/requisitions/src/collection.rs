//! Proof-of-collection tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_core::DomainError;

use crate::lifecycle::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionType {
    Partial,
    Full,
}

impl core::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CollectionType::Partial => f.write_str("Partial"),
            CollectionType::Full => f.write_str("Full"),
        }
    }
}

/// Someone physically picked up part or all of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEvent {
    pub collected_by: String,
    #[serde(rename = "type")]
    pub collection_type: CollectionType,
    pub timestamp: DateTime<Utc>,
}

/// Decide the type of the next collection event, or refuse it.
///
/// Collections are accepted only while `Partial` or `Delivered`, and never
/// after a `Full` event. Without an explicit type, a `Delivered` order
/// records `Full` and a `Partial` order records `Partial`.
pub fn decide_collection_type(
    status: OrderStatus,
    history: &[CollectionEvent],
    requested: Option<CollectionType>,
) -> Result<CollectionType, DomainError> {
    if !status.accepts_collection() {
        return Err(DomainError::invalid_state(format!(
            "collections require a Partial or Delivered order (status is {status})"
        )));
    }

    if history
        .iter()
        .any(|e| e.collection_type == CollectionType::Full)
    {
        return Err(DomainError::conflict(
            "order already has a Full collection; no further collections are accepted",
        ));
    }

    Ok(requested.unwrap_or(match status {
        OrderStatus::Delivered => CollectionType::Full,
        _ => CollectionType::Partial,
    }))
}

/// A badge holder known to the site roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub card_number: String,
    pub id_number: String,
    pub name: String,
}

impl RosterEntry {
    /// `"idNumber - name"`, the form recorded as `collected_by`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.id_number, self.name)
    }

    /// Entries missing any field are unusable for lookups.
    pub fn is_complete(&self) -> bool {
        !self.card_number.trim().is_empty()
            && !self.id_number.trim().is_empty()
            && !self.name.trim().is_empty()
    }
}

/// Lookup of scanned card identifiers (external collaborator).
pub trait Roster: Send + Sync {
    fn lookup(&self, raw_id: &str) -> Option<RosterEntry>;
}

impl<R> Roster for std::sync::Arc<R>
where
    R: Roster + ?Sized,
{
    fn lookup(&self, raw_id: &str) -> Option<RosterEntry> {
        (**self).lookup(raw_id)
    }
}

/// Turn a raw scan into the `collected_by` label.
///
/// Known cards resolve to the roster label; unknown ones are recorded as the
/// trimmed raw identifier.
pub fn resolve_collector(roster: &dyn Roster, raw_id: &str) -> Result<String, DomainError> {
    let scanned = raw_id.trim();
    if scanned.is_empty() {
        return Err(DomainError::validation("scanned identifier cannot be empty"));
    }
    Ok(roster
        .lookup(scanned)
        .map(|entry| entry.label())
        .unwrap_or_else(|| scanned.to_string()))
}
