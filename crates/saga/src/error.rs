//! Saga error types.

use common::{AggregateId, ErrorKind};
use domain::DomainError;
use event_store::EventStoreError;
use thiserror::Error;

use crate::services::{CartError, CatalogError, InventoryError};
use crate::state::SagaState;

/// Errors returned by the order coordinator.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("None of the requested products are in the cart")]
    NoMatchingCartLines,

    /// Every requested line was skipped during a multi-product order.
    #[error("No orderable items among the requested products")]
    NothingToOrder,

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A later step failed after earlier steps committed. The saga is
    /// suspended and can be resumed.
    #[error("Saga {saga_id} suspended at step '{step}': {reason}")]
    SideEffectFailed {
        saga_id: AggregateId,
        step: String,
        reason: String,
    },

    #[error("Saga not found: {0}")]
    SagaNotFound(AggregateId),

    #[error("Saga {saga_id} is {state}; only suspended sagas can be resumed")]
    NotResumable {
        saga_id: AggregateId,
        state: SagaState,
    },

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::EmptyCart | SagaError::NoMatchingCartLines | SagaError::SagaNotFound(_) => {
                ErrorKind::NotFound
            }
            SagaError::NothingToOrder => ErrorKind::OperationFailed,
            SagaError::Inventory(e) => e.kind(),
            SagaError::Cart(_) => ErrorKind::Internal,
            SagaError::Catalog(e) => e.kind(),
            SagaError::SideEffectFailed { .. } => ErrorKind::SideEffectFailed,
            SagaError::NotResumable { .. } => ErrorKind::BadRequest,
            SagaError::Domain(e) => e.kind(),
            SagaError::EventStore(e) => e.kind(),
            SagaError::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
