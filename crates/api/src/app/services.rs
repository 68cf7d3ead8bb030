//! Infrastructure wiring for the HTTP layer.
//!
//! Builds the in-memory store, bus, catalog and roster, starts the approval
//! notification worker, and runs every storage call off the async runtime
//! under the configured timeout.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;

use reqflow_core::DomainError;
use reqflow_events::{EventEnvelope, InMemoryEventBus};
use reqflow_infra::command_dispatcher::CommandDispatcher;
use reqflow_infra::config::{ConfigError, Settings};
use reqflow_infra::notify::{ApprovalNotifier, LoggingNotifier, ORDER_CREATED, notify_on_created};
use reqflow_infra::roster::InMemoryRoster;
use reqflow_infra::service::RequisitionService;
use reqflow_infra::store::InMemoryRequisitionStore;
use reqflow_infra::workers::{EventWorker, WorkerHandle};

pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Requisitions = RequisitionService<InMemoryRequisitionStore, Bus>;

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot start notification worker: {0}")]
    Worker(#[from] std::io::Error),
}

pub struct AppServices {
    requisitions: Requisitions,
    roster: Arc<InMemoryRoster>,
    storage_timeout: Duration,
    _notifier: WorkerHandle,
}

impl AppServices {
    pub fn requisitions(&self) -> &Requisitions {
        &self.requisitions
    }

    pub fn roster(&self) -> &InMemoryRoster {
        &self.roster
    }

    /// Run a blocking storage operation on the blocking pool, bounded by the
    /// storage timeout. A timeout or a panicked task surfaces as
    /// `StorageFailure`.
    ///
    /// A timed-out task is not cancelled and may still commit. Deliveries are
    /// safe to resend since they carry cumulative totals. Collections append,
    /// so a client retrying one after a 503 must send the `expectedVersion` it
    /// read beforehand; a retry of an attempt that did commit then fails with
    /// `conflict` instead of appending a second event.
    pub async fn run<T, F>(self: &Arc<Self>, op: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&AppServices) -> Result<T, DomainError> + Send + 'static,
    {
        let services = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || op(&services));

        match tokio::time::timeout(self.storage_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DomainError::storage(format!("storage task failed: {join_err}"))),
            Err(_) => Err(DomainError::storage(format!(
                "storage call timed out after {}ms",
                self.storage_timeout.as_millis()
            ))),
        }
    }
}

pub fn build_services(settings: &Settings) -> Result<AppServices, InitError> {
    let notifier: Arc<dyn ApprovalNotifier> = Arc::new(LoggingNotifier::new(settings.approver.clone()));
    build_services_with(settings, notifier)
}

pub fn build_services_with(
    settings: &Settings,
    notifier: Arc<dyn ApprovalNotifier>,
) -> Result<AppServices, InitError> {
    let catalog = Arc::new(settings.load_catalog()?);
    let roster = Arc::new(InMemoryRoster::new());

    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(InMemoryRequisitionStore::new(), bus.clone());

    // Subscribed before any command can run, so no submission is missed.
    let worker = EventWorker::spawn("approval-notifier", bus, &[ORDER_CREATED], move |envelope| {
        notify_on_created(notifier.as_ref(), &envelope)
    })?;

    tracing::info!(
        catalog_parts = catalog.len(),
        storage_timeout_ms = settings.storage_timeout.as_millis() as u64,
        "services initialised"
    );

    Ok(AppServices {
        requisitions: RequisitionService::new(dispatcher, catalog, roster.clone()),
        roster,
        storage_timeout: settings.storage_timeout,
        _notifier: worker,
    })
}
