//! Inventory domain module.
//!
//! Products own their stock counter and an append-only history of the stock
//! movements that produced it. Pure domain logic: no IO, no storage.

pub mod product;
pub mod transaction;

pub use product::Product;
pub use transaction::{InventoryTransaction, TransactionType};
