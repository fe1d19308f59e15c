//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values
/// (`Money` is the main one in this workspace). To "modify" a value object,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
