//! Event model, pub/sub mechanics and projection plumbing.
//!
//! Nothing here knows about warehouses or orders; domain crates implement [`Event`]
//! for their own event enums.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod projection;
pub mod cursor;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
pub use projection::rebuild_from_scratch;
pub use cursor::{CursorDecision, ProjectionCursor, ProjectionError, StreamCursors, ensure_same_tenant};
