//! `pettycash-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, BranchId, OrganizationId, UserId};
pub use money::Money;
pub use value_object::ValueObject;

#[doc(hidden)]
pub mod __private {
    pub use uuid::Uuid;
}
