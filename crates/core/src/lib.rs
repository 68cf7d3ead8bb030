//! Domain foundation building blocks.
//!
//! Pure domain primitives shared by the requisition and inventory crates
//! (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, LineItemId, PartNumber};
