//! Read-model builders fed from published envelopes.

use serde_json::Value as JsonValue;

use crate::{EventEnvelope, ProjectionError};

/// A disposable read model built from JSON envelopes.
///
/// Implementations must be idempotent: delivery is at-least-once, so an envelope at or
/// below the stream cursor is ignored (see [`crate::cursor::StreamCursors`]).
pub trait Projection: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Whether envelopes of this aggregate type feed the projection.
    fn consumes(&self, aggregate_type: &str) -> bool;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop every row and cursor (rebuild support).
    fn reset(&self);
}

/// Rebuild a projection by replaying envelopes in `(tenant, aggregate, sequence)` order.
///
/// Envelopes of aggregate types the projection does not consume are skipped.
pub fn rebuild_from_scratch<P>(
    projection: &P,
    envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
) -> Result<(), ProjectionError>
where
    P: Projection + ?Sized,
{
    projection.reset();

    let mut envs: Vec<_> = envelopes
        .into_iter()
        .filter(|e| projection.consumes(e.aggregate_type()))
        .collect();
    envs.sort_by_key(|e| (e.tenant_id(), e.aggregate_id(), e.sequence_number()));

    for env in &envs {
        projection.apply_envelope(env)?;
    }
    Ok(())
}
