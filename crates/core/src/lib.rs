//! `stockledger-core`: domain building blocks shared by every module.
//!
//! Pure domain primitives only (no IO, no persistence).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use quantity::Quantity;
pub use value_object::ValueObject;
