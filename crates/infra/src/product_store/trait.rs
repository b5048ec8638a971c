use std::sync::Arc;

use thiserror::Error;

use stockroom_core::{DomainError, DomainResult, ExpectedVersion, ProductId};
use stockroom_inventory::{InventoryTransaction, Product};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("product not found: {0}")]
    NotFound(ProductId),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("product has no identifier; insert it before saving")]
    Unidentified,

    #[error("store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Persistence collaborator for products.
///
/// Implementations must:
/// - persist a product and its full transaction history as one unit
/// - assign product and transaction identifiers
/// - make a stock change visible only together with its transaction record
/// - run mutations on the same product one at a time
pub trait ProductStore: Send + Sync {
    /// Persist a new product, assigning its identifier (and those of any
    /// transactions it already carries).
    fn insert(&self, product: Product) -> Result<ProductId, StoreError>;

    /// Load a snapshot of a product and its history.
    fn get(&self, id: ProductId) -> Result<Product, StoreError>;

    /// Run `f` against the stored product under that product's exclusive lock.
    ///
    /// The product is only replaced when `f` succeeds; on error nothing changes.
    fn modify<R, F>(&self, id: ProductId, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Product) -> DomainResult<R>;

    /// Replace a stored product, provided the stored version still matches.
    ///
    /// A snapshot older than the stored state (lower version, earlier `updated_at`,
    /// or a history that does not extend the stored one) is refused even under
    /// `ExpectedVersion::Any`.
    fn save(&self, product: Product, expected_version: ExpectedVersion) -> Result<(), StoreError>;

    /// Ordered stock history of a product.
    fn transactions(&self, id: ProductId) -> Result<Vec<InventoryTransaction>, StoreError> {
        Ok(self.get(id)?.transactions().to_vec())
    }

    /// Products currently at or below their reorder level.
    fn low_stock(&self) -> Result<Vec<ProductId>, StoreError>;
}

impl<S> ProductStore for Arc<S>
where
    S: ProductStore,
{
    fn insert(&self, product: Product) -> Result<ProductId, StoreError> {
        (**self).insert(product)
    }

    fn get(&self, id: ProductId) -> Result<Product, StoreError> {
        (**self).get(id)
    }

    fn modify<R, F>(&self, id: ProductId, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Product) -> DomainResult<R>,
    {
        (**self).modify(id, f)
    }

    fn save(&self, product: Product, expected_version: ExpectedVersion) -> Result<(), StoreError> {
        (**self).save(product, expected_version)
    }

    fn transactions(&self, id: ProductId) -> Result<Vec<InventoryTransaction>, StoreError> {
        (**self).transactions(id)
    }

    fn low_stock(&self) -> Result<Vec<ProductId>, StoreError> {
        (**self).low_stock()
    }
}
