//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! command → load stream → rehydrate → handle → append (exact version) → publish
//! ```
//!
//! The dispatcher owns no business rules; it enforces tenant isolation on loaded
//! streams, optimistic concurrency on append, and publish-after-append ordering.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use stockledger_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use stockledger_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Business rule rejection (validation, invariant, not found, conflict).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Stale stream version; reload and retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// A stored payload no longer deserializes into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Append succeeded but publication failed (at-least-once; a retry may duplicate).
    #[error("publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run one command against one aggregate stream.
    ///
    /// Returns the committed events (empty when the aggregate decided nothing happens).
    /// A concurrent writer on the same stream yields [`DispatchError::Concurrency`].
    #[instrument(skip(self, command, make_aggregate), fields(tenant_id = %tenant_id, aggregate_id = %aggregate_id), err)]
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockledger_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate = make_aggregate(tenant_id, aggregate_id);
        let (committed, _) = self.dispatch_on(tenant_id, aggregate_id, aggregate_type, command, aggregate)?;
        Ok(committed)
    }

    /// Run one command against an aggregate already rehydrated up to `aggregate.version()`.
    ///
    /// Only the events after that version are read from the store. Returns the committed
    /// events together with the aggregate advanced past them, ready to be kept as the
    /// next snapshot.
    pub fn dispatch_on<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        aggregate: A,
    ) -> Result<(Vec<StoredEvent>, A), DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockledger_events::Event + Serialize + DeserializeOwned,
    {
        let mut aggregate = self.catch_up(tenant_id, aggregate_id, aggregate_type, aggregate)?;
        let expected = ExpectedVersion::Exact(aggregate.version());

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok((vec![], aggregate));
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(tenant_id, aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        debug!(aggregate_type, committed = committed.len(), "events appended");

        for ev in &decided {
            aggregate.apply(ev);
        }

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok((committed, aggregate))
    }

    /// Rehydrate an aggregate without handling a command (strong read).
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.catch_up(tenant_id, aggregate_id, aggregate_type, make_aggregate(tenant_id, aggregate_id))
    }

    /// Apply the events stored after `aggregate.version()`.
    pub fn catch_up<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        mut aggregate: A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let after = aggregate.version();
        let tail = self.store.load_stream_after(tenant_id, aggregate_id, after)?;
        validate_loaded_stream(tenant_id, aggregate_id, aggregate_type, after, &tail)?;
        apply_history(&mut aggregate, &tail)?;
        Ok(aggregate)
    }
}

/// Re-check what the store returned: right tenant, right stream, right type, and sequence
/// numbers continuing `after` without gaps.
fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    after: u64,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = after;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.aggregate_type != aggregate_type {
            return Err(DispatchError::Store(EventStoreError::AggregateTypeMismatch(format!(
                "stream is '{}', expected '{aggregate_type}'",
                e.aggregate_type
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
