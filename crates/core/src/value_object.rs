//! Value objects: compared by value, immutable once built.

/// Marker trait for value objects.
///
/// Two value objects with the same attributes are the same value
/// (`Quantity`, `ChangeReason`, an order line). To "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
