use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{
    AggregateRoot, Clock, DomainError, DomainResult, Entity, ProductId, TransactionId,
};

use crate::transaction::{InventoryTransaction, TransactionType};

/// Aggregate root: Product.
///
/// The product is the only writer of its stock counter. Every successful stock
/// mutation appends exactly one [`InventoryTransaction`] to the product's own
/// history, so the counter and the history change together or not at all.
/// Metadata edits go through [`Product::update`] and never touch stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: Option<ProductId>,
    name: String,
    description: String,
    category: String,
    unit_price: Decimal,
    quantity_in_stock: i32,
    reorder_level: i32,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    transactions: Vec<InventoryTransaction>,
    version: u64,
}

impl Product {
    /// Create a product with an empty history.
    ///
    /// Initial values are taken as given. Negative stock, reorder level or price
    /// is accepted but logged, since only stock mutations are validated.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        unit_price: Decimal,
        quantity_in_stock: i32,
        reorder_level: i32,
        clock: &dyn Clock,
    ) -> Self {
        let product = Self {
            id: None,
            name: name.into(),
            description: description.into(),
            category: category.into(),
            unit_price,
            quantity_in_stock,
            reorder_level,
            created_at: clock.now(),
            updated_at: None,
            transactions: Vec::new(),
            version: 0,
        };

        if quantity_in_stock < 0 || reorder_level < 0 || unit_price.is_sign_negative() {
            tracing::warn!(
                name = %product.name,
                quantity_in_stock,
                reorder_level,
                unit_price = %unit_price,
                "product constructed with negative initial values"
            );
        }

        product
    }

    pub fn id_typed(&self) -> Option<ProductId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn quantity_in_stock(&self) -> i32 {
        self.quantity_in_stock
    }

    pub fn reorder_level(&self) -> i32 {
        self.reorder_level
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Stock movements in the order they happened.
    pub fn transactions(&self) -> &[InventoryTransaction] {
        &self.transactions
    }

    /// Net stock change recorded by the history (additions minus withdrawals).
    pub fn net_transacted(&self) -> i64 {
        self.transactions.iter().map(InventoryTransaction::signed_quantity).sum()
    }

    /// True when stock is at or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.quantity_in_stock <= self.reorder_level
    }

    pub fn add_stock(&mut self, quantity: i32, clock: &dyn Clock) -> DomainResult<()> {
        self.add_stock_with_notes(quantity, String::new(), clock)
    }

    /// Increase stock by `quantity` and record an addition.
    ///
    /// Fails with `DomainError::Validation` for a non-positive quantity, leaving the
    /// product untouched.
    pub fn add_stock_with_notes(
        &mut self,
        quantity: i32,
        notes: impl Into<String>,
        clock: &dyn Clock,
    ) -> DomainResult<()> {
        self.ensure_positive(quantity, TransactionType::Addition)?;

        let new_quantity = self
            .quantity_in_stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invariant("stock quantity overflow"))?;

        self.quantity_in_stock = new_quantity;
        self.record(TransactionType::Addition, quantity, notes.into(), clock);
        Ok(())
    }

    pub fn withdraw_stock(&mut self, quantity: i32, clock: &dyn Clock) -> DomainResult<bool> {
        self.withdraw_stock_with_notes(quantity, String::new(), clock)
    }

    /// Decrease stock by `quantity` and record a withdrawal.
    ///
    /// Returns `Ok(false)` without changing anything when stock is insufficient.
    /// A non-positive quantity is a `DomainError::Validation`.
    pub fn withdraw_stock_with_notes(
        &mut self,
        quantity: i32,
        notes: impl Into<String>,
        clock: &dyn Clock,
    ) -> DomainResult<bool> {
        self.ensure_positive(quantity, TransactionType::Withdrawal)?;

        if quantity > self.quantity_in_stock {
            tracing::info!(
                product_id = ?self.id,
                requested = quantity,
                available = self.quantity_in_stock,
                "withdrawal refused: insufficient stock"
            );
            return Ok(false);
        }

        self.quantity_in_stock -= quantity;
        self.record(TransactionType::Withdrawal, quantity, notes.into(), clock);
        Ok(true)
    }

    /// Overwrite descriptive fields and the reorder level.
    ///
    /// Stock and history are left alone.
    pub fn update(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        unit_price: Decimal,
        reorder_level: i32,
        clock: &dyn Clock,
    ) {
        self.name = name.into();
        self.description = description.into();
        self.category = category.into();
        self.unit_price = unit_price;
        self.reorder_level = reorder_level;

        let now = clock.now();
        // Never move backwards, even if the clock does.
        self.updated_at = Some(match self.updated_at {
            Some(previous) if previous > now => previous,
            _ => now,
        });
        self.version += 1;
    }

    /// Stamp persistence-assigned identifiers onto the product and onto every
    /// transaction that does not carry one yet.
    ///
    /// Re-assigning a different product id is an invariant violation.
    pub fn assign_identity(
        &mut self,
        product_id: ProductId,
        mut next_transaction_id: impl FnMut() -> TransactionId,
    ) -> DomainResult<()> {
        if let Some(existing) = self.id {
            if existing != product_id {
                return Err(DomainError::invariant(format!(
                    "product already identified as {existing}, cannot become {product_id}"
                )));
            }
        }

        self.id = Some(product_id);
        for txn in &mut self.transactions {
            txn.stamp(product_id, &mut next_transaction_id);
        }
        Ok(())
    }
}

impl Product {
    fn ensure_positive(&self, quantity: i32, kind: TransactionType) -> DomainResult<()> {
        if quantity <= 0 {
            tracing::warn!(
                product_id = ?self.id,
                quantity,
                kind = %kind,
                "stock mutation rejected: quantity must be positive"
            );
            return Err(DomainError::validation(format!(
                "{kind} quantity must be positive, got {quantity}"
            )));
        }
        Ok(())
    }

    fn record(&mut self, kind: TransactionType, quantity: i32, notes: String, clock: &dyn Clock) {
        let txn = InventoryTransaction::new(self.id, kind, quantity, clock).with_notes(notes);
        self.transactions.push(txn);
        self.version += 1;

        tracing::debug!(
            product_id = ?self.id,
            kind = %kind,
            quantity,
            quantity_in_stock = self.quantity_in_stock,
            "stock mutated"
        );
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Option<&Self::Id> {
        self.id.as_ref()
    }
}

impl AggregateRoot for Product {
    fn version(&self) -> u64 {
        self.version
    }
}
