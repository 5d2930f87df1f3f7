//! Identifiers and error kinds shared by every crate of the order engine.

pub mod error;
pub mod types;

pub use error::ErrorKind;
pub use types::{AggregateId, UserId};
