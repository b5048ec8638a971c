use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use stockroom_core::{
    AggregateRoot, DomainError, DomainResult, Entity, ExpectedVersion, ProductId, TransactionId,
};
use stockroom_inventory::Product;

use super::r#trait::{ProductStore, StoreError};

type Slot = Arc<Mutex<Product>>;

/// In-memory product store.
///
/// Each product sits behind its own mutex, so mutations on one product are
/// serialized while different products proceed independently. Intended for
/// tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<ProductId, Slot>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::Poisoned)?;
        Ok(products.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn slot(&self, id: ProductId) -> Result<Slot, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::Poisoned)?;
        products.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }
}

impl ProductStore for InMemoryProductStore {
    fn insert(&self, mut product: Product) -> Result<ProductId, StoreError> {
        let id = product.id_typed().unwrap_or_default();
        product.assign_identity(id, TransactionId::new)?;

        let mut products = self.products.write().map_err(|_| StoreError::Poisoned)?;
        if products.contains_key(&id) {
            return Err(StoreError::Concurrency(format!("product {id} already stored")));
        }
        products.insert(id, Arc::new(Mutex::new(product)));

        tracing::debug!(product_id = %id, "product inserted");
        Ok(id)
    }

    fn get(&self, id: ProductId) -> Result<Product, StoreError> {
        let slot = self.slot(id)?;
        let product = slot.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(product.clone())
    }

    fn modify<R, F>(&self, id: ProductId, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Product) -> DomainResult<R>,
    {
        let slot = self.slot(id)?;
        let mut stored = slot.lock().map_err(|_| StoreError::Poisoned)?;

        // Work on a copy so a failing closure leaves no partial changes behind.
        let mut working = stored.clone();
        let result = f(&mut working)?;
        working.assign_identity(id, TransactionId::new)?;
        *stored = working;

        Ok(result)
    }

    fn save(
        &self,
        mut product: Product,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let id = *product.id().ok_or(StoreError::Unidentified)?;
        let slot = self.slot(id)?;
        let mut stored = slot.lock().map_err(|_| StoreError::Poisoned)?;

        expected_version
            .check(stored.version())
            .map_err(|err| match err {
                DomainError::Conflict(msg) => {
                    StoreError::Concurrency(format!("product {id}: {msg}"))
                }
                other => StoreError::Domain(other),
            })?;

        // Even without a version expectation, a snapshot may not roll state back.
        if product.version() < stored.version() || product.updated_at() < stored.updated_at() {
            return Err(StoreError::Concurrency(format!(
                "product {id}: snapshot would roll back stored state \
                 (version {} -> {}, updated_at {:?} -> {:?})",
                stored.version(),
                product.version(),
                stored.updated_at(),
                product.updated_at()
            )));
        }

        let prior = stored.transactions();
        let history_kept = product.transactions().len() >= prior.len()
            && product.transactions()[..prior.len()] == *prior;
        if !history_kept {
            return Err(StoreError::Concurrency(format!(
                "product {id}: transaction history must only be appended to"
            )));
        }

        product.assign_identity(id, TransactionId::new)?;
        *stored = product;
        Ok(())
    }

    fn low_stock(&self) -> Result<Vec<ProductId>, StoreError> {
        let products = self.products.read().map_err(|_| StoreError::Poisoned)?;
        let mut ids = Vec::new();
        for (id, slot) in products.iter() {
            let product = slot.lock().map_err(|_| StoreError::Poisoned)?;
            if product.is_low_stock() {
                ids.push(*id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use chrono::Duration;
    use stockroom_core::{Clock, ManualClock, SystemClock};
    use stockroom_inventory::TransactionType;

    fn test_clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
    }

    fn widget(quantity: i32, reorder_level: i32, clock: &dyn Clock) -> Product {
        let price = Decimal::new(499, 2);
        Product::new("Widget", "Blue widget", "Widgets", price, quantity, reorder_level, clock)
    }

    #[test]
    fn insert_assigns_identity_to_product_and_existing_history() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let mut product = widget(10, 2, &clock);
        product.add_stock(5, &clock).unwrap();

        assert!(store.is_empty().unwrap());
        let id = store.insert(product).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        let loaded = store.get(id).unwrap();

        assert_eq!(loaded.id_typed(), Some(id));
        assert_eq!(loaded.quantity_in_stock(), 15);
        let txn = &loaded.transactions()[0];
        assert_eq!(txn.product_id(), Some(id));
        assert!(txn.id_typed().is_some());
    }

    #[test]
    fn get_unknown_product_is_not_found() {
        let store = InMemoryProductStore::new();
        let id = ProductId::new();
        match store.get(id) {
            Err(StoreError::NotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn modify_applies_stock_change_and_record_together() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let id = store.insert(widget(100, 20, &clock)).unwrap();

        let withdrawn = store.modify(id, |p| p.withdraw_stock(30, &clock)).unwrap();
        assert!(withdrawn);

        let history = store.transactions(id).unwrap();
        assert_eq!(store.get(id).unwrap().quantity_in_stock(), 70);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_type(), TransactionType::Withdrawal);
        assert_eq!(history[0].product_id(), Some(id));
        assert!(history[0].id_typed().is_some());
    }

    #[test]
    fn modify_discards_partial_work_on_error() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let id = store.insert(widget(10, 0, &clock)).unwrap();

        let err = store
            .modify(id, |p| {
                p.add_stock(5, &clock)?;
                p.add_stock(0, &clock)
            })
            .unwrap_err();

        match err {
            StoreError::Domain(DomainError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
        let product = store.get(id).unwrap();
        assert_eq!(product.quantity_in_stock(), 10);
        assert!(product.transactions().is_empty());
    }

    #[test]
    fn save_checks_expected_version() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let id = store.insert(widget(10, 0, &clock)).unwrap();

        let mut first = store.get(id).unwrap();
        let mut second = store.get(id).unwrap();
        let loaded_version = first.version();

        first.add_stock(1, &clock).unwrap();
        store.save(first, ExpectedVersion::Exact(loaded_version)).unwrap();

        second.withdraw_stock(1, &clock).unwrap();
        match store.save(second, ExpectedVersion::Exact(loaded_version)) {
            Err(StoreError::Concurrency(_)) => {}
            other => panic!("expected Concurrency, got {other:?}"),
        }

        let product = store.get(id).unwrap();
        assert_eq!(product.quantity_in_stock(), 11);
        assert_eq!(product.transactions().len(), 1);
        assert!(product.transactions()[0].id_typed().is_some());
    }

    #[test]
    fn save_requires_an_identified_product() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        match store.save(widget(1, 0, &clock), ExpectedVersion::Any) {
            Err(StoreError::Unidentified) => {}
            other => panic!("expected Unidentified, got {other:?}"),
        }
    }

    #[test]
    fn save_rejects_rewritten_history() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let id = store.insert(widget(10, 0, &clock)).unwrap();
        store.modify(id, |p| p.add_stock(3, &clock)).unwrap();

        // Same identity, but without the record the store already holds.
        let mut stale = widget(10, 0, &clock);
        stale.assign_identity(id, TransactionId::new).unwrap();
        stale.update("Widget", "Blue widget", "Widgets", Decimal::new(499, 2), 0, &clock);

        match store.save(stale, ExpectedVersion::Any) {
            Err(StoreError::Concurrency(msg)) => assert!(msg.contains("appended")),
            other => panic!("expected Concurrency, got {other:?}"),
        }
    }

    #[test]
    fn save_rejects_snapshot_older_than_stored_state() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let id = store.insert(widget(10, 0, &clock)).unwrap();

        let stale = store.get(id).unwrap();
        let mut edited = store.get(id).unwrap();
        clock.advance(Duration::minutes(5));
        edited.update("B", "", "Widgets", Decimal::new(599, 2), 0, &clock);
        store.save(edited, ExpectedVersion::Exact(0)).unwrap();

        // Skipping the version expectation must not roll version or updated_at back.
        match store.save(stale.clone(), ExpectedVersion::Any) {
            Err(StoreError::Concurrency(msg)) => assert!(msg.contains("roll back")),
            other => panic!("expected Concurrency, got {other:?}"),
        }
        let stored = store.get(id).unwrap();
        assert_eq!(stored.version(), 1);
        assert_eq!(stored.name(), "B");
        assert_eq!(stored.updated_at(), Some(clock.now()));

        // The old holder of version 0 cannot overwrite the newer edit either.
        let mut late = stale;
        late.update("A", "", "Widgets", Decimal::new(499, 2), 0, &clock);
        match store.save(late, ExpectedVersion::Exact(0)) {
            Err(StoreError::Concurrency(msg)) => assert!(msg.contains("expected: Exact(0)")),
            other => panic!("expected Concurrency, got {other:?}"),
        }
        assert_eq!(store.get(id).unwrap().name(), "B");
    }

    #[test]
    fn save_rejects_updated_at_moving_backwards() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let id = store.insert(widget(10, 0, &clock)).unwrap();

        let mut early = store.get(id).unwrap();
        early.update("early", "", "Widgets", Decimal::new(499, 2), 0, &clock);
        early.add_stock(1, &clock).unwrap();

        let mut later = store.get(id).unwrap();
        clock.advance(Duration::hours(1));
        later.update("later", "", "Widgets", Decimal::new(499, 2), 0, &clock);
        store.save(later, ExpectedVersion::Any).unwrap();

        // Higher version, but its last edit predates the stored one.
        match store.save(early, ExpectedVersion::Any) {
            Err(StoreError::Concurrency(_)) => {}
            other => panic!("expected Concurrency, got {other:?}"),
        }
        assert_eq!(store.get(id).unwrap().name(), "later");
    }

    #[test]
    fn low_stock_lists_products_at_or_below_reorder_level() {
        let clock = test_clock();
        let store = InMemoryProductStore::new();
        let at_level = store.insert(widget(20, 20, &clock)).unwrap();
        let above = store.insert(widget(21, 20, &clock)).unwrap();
        let below = store.insert(widget(5, 20, &clock)).unwrap();

        let mut expected = vec![at_level, below];
        expected.sort();
        assert_eq!(store.low_stock().unwrap(), expected);

        store.modify(above, |p| p.withdraw_stock(1, &clock)).unwrap();
        assert_eq!(store.low_stock().unwrap().len(), 3);
    }

    #[test]
    fn concurrent_withdrawals_never_oversell() {
        let store = Arc::new(InMemoryProductStore::new());
        let id = store.insert(widget(100, 0, &SystemClock)).unwrap();

        let successes: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        let mut ok = 0usize;
                        for _ in 0..25 {
                            if store.modify(id, |p| p.withdraw_stock(1, &SystemClock)).unwrap() {
                                ok += 1;
                            }
                        }
                        ok
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        let product = store.get(id).unwrap();
        assert_eq!(successes, 100);
        assert_eq!(product.quantity_in_stock(), 0);
        assert_eq!(product.transactions().len(), 100);
        assert_eq!(product.net_transacted(), -100);
    }
}
