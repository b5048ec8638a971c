//! Product persistence boundary.
//!
//! Stores load and save a product together with its ordered transaction history,
//! assign identifiers, and serialize mutations per product.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryProductStore;
pub use r#trait::{ProductStore, StoreError};
