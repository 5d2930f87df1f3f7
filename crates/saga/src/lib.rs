//! Order coordination for the order engine.
//!
//! Every public operation commits a command on the order aggregate and then
//! runs its side effects as a saga recorded in the journal:
//!
//! 1. Place order: persist order, reserve stock per item, clear cart lines
//! 2. Cancel order / item: restock each released item
//! 3. Return item: open the linked refund or replace order
//!
//! A failed reservation compensates the earlier reservations in reverse
//! order and voids the order. Any other failed step suspends the saga so it
//! can be resumed once the collaborator recovers.

pub mod aggregate;
pub mod assembler;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod policy;
pub mod services;
pub mod state;
pub mod steps;

pub use aggregate::SagaInstance;
pub use assembler::{AssembledOrder, OrderAssembler};
pub use coordinator::{Cancellation, OrderCoordinator, PlacedOrder, ReturnReceipt};
pub use error::SagaError;
pub use events::SagaEvent;
pub use services::{
    Cart, CartError, CartLine, CartReader, Catalog, CatalogError, InMemoryCartStore,
    InMemoryCatalog, InMemoryInventoryLedger, InventoryError, InventoryLedger,
    PostgresInventoryLedger,
};
pub use state::SagaState;
pub use steps::SagaStep;
