//! Domain layer of the order engine.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - Command trait and CommandHandler (load, decide, append with a version check)
//! - The Order aggregate with its header and per-item state machines
//! - OrderService, the persistence-facing API used by the saga coordinator

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    CancelOrder, CancelOrderItem, CancelReason, ItemStatus, Money, Order, OrderError, OrderEvent,
    OrderItem, OrderService, OrderStatus, OrderType, PlaceOrder, ProductId, ReleasedItem,
    RequestReturn, ReturnType, UpdateItemStatus, UpdateOrderStatus, VoidOrder,
};
