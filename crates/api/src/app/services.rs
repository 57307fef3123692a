//! Infrastructure wiring: event store, bus, dispatcher, read models, workflow.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::command_dispatcher::CommandDispatcher;
use stockledger_infra::event_store::{EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore};
use stockledger_infra::projections::ReadModels;
use stockledger_infra::workflow::InventoryWorkflow;

use crate::config::Settings;

pub type SharedStore = Arc<dyn EventStore>;
pub type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
pub type Workflow = InventoryWorkflow<SharedStore, Bus>;

#[derive(Clone)]
pub struct AppServices {
    workflow: Arc<Workflow>,
}

impl AppServices {
    /// Everything in process memory (dev/test).
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryEventStore::new()))
    }

    /// Postgres event store; read models are rebuilt from it before serving.
    ///
    /// Requires a multi-threaded tokio runtime.
    pub async fn postgres(database_url: &str) -> Result<Self, EventStoreError> {
        let store = PostgresEventStore::connect(database_url).await?;
        store.migrate().await?;
        let services = Self::with_store(Arc::new(store));
        services
            .workflow
            .rebuild_read_models()
            .map_err(EventStoreError::Backend)?;
        info!("read models rebuilt from postgres");
        Ok(services)
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self, EventStoreError> {
        match &settings.database_url {
            Some(url) => Self::postgres(url).await,
            None => {
                info!("no database_url configured; using the in-memory event store");
                Ok(Self::in_memory())
            }
        }
    }

    fn with_store(store: SharedStore) -> Self {
        let dispatcher = CommandDispatcher::new(store, Bus::new());
        let workflow = InventoryWorkflow::new(dispatcher, Arc::new(ReadModels::in_memory()));
        Self {
            workflow: Arc::new(workflow),
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn models(&self) -> &ReadModels {
        self.workflow.models()
    }
}
