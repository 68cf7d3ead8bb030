//! Approval notifications for newly submitted orders.
//!
//! Driven from committed `requisitions.order.created` events on the bus, so a
//! slow or failing notifier can never hold up or undo a submission.

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use reqflow_events::EventEnvelope;
use reqflow_requisitions::{OrderCreated, OrderEvent, OrderId};

pub const ORDER_CREATED: &str = "requisitions.order.created";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("cannot decode event payload: {0}")]
    Decode(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// What an approver needs to act on a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub order_id: OrderId,
    pub number: u64,
    pub requester: String,
    pub emp_id: String,
    pub dept: String,
    pub category: String,
    pub line_count: usize,
}

impl From<&OrderCreated> for ApprovalRequest {
    fn from(e: &OrderCreated) -> Self {
        Self {
            order_id: e.order_id,
            number: e.number,
            requester: e.user_details.name.clone(),
            emp_id: e.user_details.emp_id.clone(),
            dept: e.user_details.dept.clone(),
            category: e.category.clone(),
            line_count: e.line_items.len(),
        }
    }
}

/// Outbound approval channel (mail, chat, ...). Best effort.
pub trait ApprovalNotifier: Send + Sync {
    fn notify(&self, request: &ApprovalRequest) -> Result<(), NotifyError>;
}

impl<N> ApprovalNotifier for std::sync::Arc<N>
where
    N: ApprovalNotifier + ?Sized,
{
    fn notify(&self, request: &ApprovalRequest) -> Result<(), NotifyError> {
        (**self).notify(request)
    }
}

/// Writes the request to the log instead of sending it anywhere.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier {
    approver: Option<String>,
}

impl LoggingNotifier {
    pub fn new(approver: Option<String>) -> Self {
        Self { approver }
    }
}

impl ApprovalNotifier for LoggingNotifier {
    fn notify(&self, request: &ApprovalRequest) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %request.order_id,
            number = request.number,
            requester = %request.requester,
            category = %request.category,
            approver = self.approver.as_deref().unwrap_or("<unset>"),
            "approval requested"
        );
        Ok(())
    }
}

/// Bus handler: turn an `OrderCreated` envelope into a notification.
///
/// Other event types are ignored.
pub fn notify_on_created(
    notifier: &dyn ApprovalNotifier,
    envelope: &EventEnvelope<JsonValue>,
) -> Result<(), NotifyError> {
    if envelope.event_type() != ORDER_CREATED {
        return Ok(());
    }

    let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| NotifyError::Decode(e.to_string()))?;

    match event {
        OrderEvent::OrderCreated(created) => notifier.notify(&ApprovalRequest::from(&created)),
        other => Err(NotifyError::Decode(format!(
            "{ORDER_CREATED} envelope carried {other:?}"
        ))),
    }
}
