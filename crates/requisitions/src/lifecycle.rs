//! Order status machine and submission-time validation.
//!
//! ```text
//! Pending ─┬─ approve ─► Approved ─┬─ deliver ─► Partial ─┬─ deliver ─► Partial
//!          │                       │                      └─ deliver ─► Delivered
//!          └─ reject ──► Rejected  └─ deliver ─► Delivered
//! ```
//!
//! `Rejected` and `Delivered` are terminal for the delivery machine; collection
//! events are still accepted while `Partial` or `Delivered`.

use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use reqflow_core::{DomainError, PartNumber};

/// Server-owned order status. Clients never set this directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Partial,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::Partial,
        OrderStatus::Delivered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Approved => "Approved",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Partial => "Partial",
            OrderStatus::Delivered => "Delivered",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Partial)
                | (Approved, Delivered)
                | (Partial, Partial)
                | (Partial, Delivered)
        )
    }

    /// Delivery submissions are only taken once approved and until complete.
    pub fn accepts_delivery(self) -> bool {
        matches!(self, OrderStatus::Approved | OrderStatus::Partial)
    }

    pub fn accepts_collection(self) -> bool {
        matches!(self, OrderStatus::Partial | OrderStatus::Delivered)
    }

    pub fn ensure_transition(self, next: OrderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::invalid_state(format!(
                "cannot move order from {self} to {next}"
            )))
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "rejected" | "declined" => Ok(OrderStatus::Rejected),
            "partial" => Ok(OrderStatus::Partial),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

/// Requester details captured at submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub emp_id: String,
    #[serde(default)]
    pub dept: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub group: Option<String>,
    /// Date the material is needed; defaults to the submission date.
    #[serde(default)]
    pub requested_date: Option<NaiveDate>,
}

impl UserDetails {
    /// Every required field must be present and non-blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("name", &self.name),
            ("empId", &self.emp_id),
            ("dept", &self.dept),
            ("zone", &self.zone),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("userDetails.{field} is required")));
            }
        }
        Ok(())
    }
}

/// One requested part as submitted, before line ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub part_number: PartNumber,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> UserDetails {
        UserDetails {
            name: "Jane".into(),
            emp_id: "E123".into(),
            dept: "Maintenance".into(),
            zone: "Z1".into(),
            group: None,
            requested_date: None,
        }
    }

    #[test]
    fn pending_moves_only_to_approved_or_rejected() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Approved));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Rejected));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Partial));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Rejected.can_transition_to(next));
            assert!(!OrderStatus::Delivered.can_transition_to(next));
        }
    }

    #[test]
    fn no_backward_moves() {
        assert!(!OrderStatus::Approved.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Partial.can_transition_to(OrderStatus::Approved));
        let err = OrderStatus::Approved.ensure_transition(OrderStatus::Rejected).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn status_parses_case_insensitively_with_legacy_alias() {
        assert_eq!("partial".parse::<OrderStatus>().unwrap(), OrderStatus::Partial);
        assert_eq!("Declined".parse::<OrderStatus>().unwrap(), OrderStatus::Rejected);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn missing_required_user_field_is_named() {
        let mut d = details();
        d.dept = "  ".into();
        let err = d.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("dept")));
        assert!(details().validate().is_ok());
    }
}
