//! Read-side helpers over rehydrated orders: list filters and status counts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::lifecycle::OrderStatus;
use crate::order::Order;

/// Dashboard list filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub category: Option<String>,
    /// Matches the requester's requested date.
    pub date: Option<NaiveDate>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.status()) {
            return false;
        }
        if let Some(category) = &self.category {
            if !category.trim().eq_ignore_ascii_case(order.category()) {
                return false;
            }
        }
        if let Some(date) = self.date {
            if order.user_details().requested_date != Some(date) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub partial: usize,
    pub delivered: usize,
}

impl OrderSummary {
    pub fn tally<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut summary = Self::default();
        for order in orders {
            summary.total += 1;
            match order.status() {
                OrderStatus::Pending => summary.pending += 1,
                OrderStatus::Approved => summary.approved += 1,
                OrderStatus::Rejected => summary.rejected += 1,
                OrderStatus::Partial => summary.partial += 1,
                OrderStatus::Delivered => summary.delivered += 1,
            }
        }
        summary
    }
}
