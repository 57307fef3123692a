//! Per-stream cursors for idempotent projections.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use stockledger_core::{AggregateId, TenantId};

use crate::EventEnvelope;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    /// The event is well-formed but cannot be folded in (arithmetic overflow).
    #[error("read model update rejected: {0}")]
    Rejected(String),

    #[error("projection lock poisoned")]
    Poisoned,
}

/// Progress of one `(tenant, aggregate)` stream inside a projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub last_sequence_number: u64,
}

/// What a projection should do with an incoming envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorDecision {
    /// Next in sequence: apply it, then call [`StreamCursors::advance`].
    Apply,
    /// Already applied (redelivery or replay).
    Skip,
}

/// Cursor table shared by every projection.
///
/// A stream starts at sequence number 1 and must increase by exactly one.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: Mutex<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check<E>(&self, envelope: &EventEnvelope<E>) -> Result<CursorDecision, ProjectionError> {
        let map = self.inner.lock().map_err(|_| ProjectionError::Poisoned)?;
        let last = map
            .get(&(envelope.tenant_id(), envelope.aggregate_id()))
            .copied()
            .unwrap_or(0);
        let seq = envelope.sequence_number();

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(CursorDecision::Skip);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(CursorDecision::Apply)
    }

    pub fn advance<E>(&self, envelope: &EventEnvelope<E>) -> Result<(), ProjectionError> {
        let mut map = self.inner.lock().map_err(|_| ProjectionError::Poisoned)?;
        map.insert(
            (envelope.tenant_id(), envelope.aggregate_id()),
            envelope.sequence_number(),
        );
        Ok(())
    }

    pub fn cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> Option<ProjectionCursor> {
        let map = self.inner.lock().ok()?;
        map.get(&(tenant_id, aggregate_id)).map(|last| ProjectionCursor {
            tenant_id,
            aggregate_id,
            last_sequence_number: *last,
        })
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.inner.lock() {
            map.clear();
        }
    }
}

/// Ensure the tenant carried inside a payload matches the envelope's tenant.
pub fn ensure_same_tenant<E>(envelope: &EventEnvelope<E>, payload_tenant: TenantId) -> Result<(), ProjectionError> {
    if envelope.tenant_id() != payload_tenant {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn env(tenant: TenantId, agg: AggregateId, seq: u64) -> EventEnvelope<()> {
        EventEnvelope::new(Uuid::now_v7(), tenant, agg, "test.stream", seq, ())
    }

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let t = TenantId::new();
        let a = AggregateId::new();

        let first = env(t, a, 1);
        assert_eq!(cursors.check(&first).unwrap(), CursorDecision::Apply);
        cursors.advance(&first).unwrap();

        assert_eq!(cursors.check(&env(t, a, 1)).unwrap(), CursorDecision::Skip);
        assert_eq!(cursors.check(&env(t, a, 2)).unwrap(), CursorDecision::Apply);
        assert_eq!(
            cursors.check(&env(t, a, 3)),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        );
        assert!(cursors.check(&env(t, a, 0)).is_err());
    }

    #[test]
    fn a_stream_must_start_at_its_first_event() {
        let cursors = StreamCursors::new();
        let t = TenantId::new();
        let a = AggregateId::new();

        assert_eq!(
            cursors.check(&env(t, a, 2)),
            Err(ProjectionError::NonMonotonicSequence { last: 0, found: 2 })
        );
        assert_eq!(cursors.check(&env(t, a, 1)).unwrap(), CursorDecision::Apply);
    }

    #[test]
    fn streams_are_tracked_per_tenant() {
        let cursors = StreamCursors::new();
        let a = AggregateId::new();
        let t1 = TenantId::new();
        let t2 = TenantId::new();

        cursors.advance(&env(t1, a, 1)).unwrap();

        assert_eq!(cursors.check(&env(t2, a, 1)).unwrap(), CursorDecision::Apply);
        assert_eq!(cursors.cursor(t1, a).map(|c| c.last_sequence_number), Some(1));
        assert!(cursors.cursor(t2, a).is_none());
    }
}
