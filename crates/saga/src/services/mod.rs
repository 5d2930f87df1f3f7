//! Collaborators the coordinator calls out to, with in-memory implementations.

pub mod cart;
pub mod catalog;
pub mod inventory;

pub use cart::{Cart, CartError, CartLine, CartReader, InMemoryCartStore};
pub use catalog::{Catalog, CatalogError, InMemoryCatalog};
pub use inventory::{
    InMemoryInventoryLedger, InventoryError, InventoryLedger, PostgresInventoryLedger,
};
