//! Infrastructure layer: persistence adapters for the inventory domain.

pub mod product_store;

pub use product_store::{InMemoryProductStore, ProductStore, StoreError};
