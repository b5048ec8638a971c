use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Clock, Entity, ProductId, TransactionId};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Addition,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Addition => "addition",
            TransactionType::Withdrawal => "withdrawal",
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one stock mutation.
///
/// `quantity` is the magnitude of the change; the direction lives in
/// `transaction_type`. Records are produced by [`crate::Product`] stock mutations
/// and never change afterwards, apart from persistence stamping identifiers onto
/// records that do not have one yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    id: Option<TransactionId>,
    product_id: Option<ProductId>,
    transaction_type: TransactionType,
    quantity: i32,
    notes: String,
    transaction_date: DateTime<Utc>,
}

impl InventoryTransaction {
    /// Record a movement with empty notes, timestamped by `clock`.
    ///
    /// No validation happens here; the owning product checks the quantity first.
    pub fn new(
        product_id: Option<ProductId>,
        transaction_type: TransactionType,
        quantity: i32,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            id: None,
            product_id,
            transaction_type,
            quantity,
            notes: String::new(),
            transaction_date: clock.now(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn id_typed(&self) -> Option<TransactionId> {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    /// Quantity with the direction applied: positive for additions.
    pub fn signed_quantity(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Addition => i64::from(self.quantity),
            TransactionType::Withdrawal => -i64::from(self.quantity),
        }
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn transaction_date(&self) -> DateTime<Utc> {
        self.transaction_date
    }

    /// Fill in identifiers that persistence has not assigned yet.
    pub(crate) fn stamp(
        &mut self,
        product_id: ProductId,
        next_id: &mut dyn FnMut() -> TransactionId,
    ) {
        if self.product_id.is_none() {
            self.product_id = Some(product_id);
        }
        if self.id.is_none() {
            self.id = Some(next_id());
        }
    }
}

impl Entity for InventoryTransaction {
    type Id = TransactionId;

    fn id(&self) -> Option<&Self::Id> {
        self.id.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stockroom_core::ManualClock;

    fn test_clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn new_sets_fields() {
        let clock = test_clock();
        let product_id = ProductId::new();

        let txn = InventoryTransaction::new(Some(product_id), TransactionType::Addition, 10, &clock)
            .with_notes("Test notes");

        assert_eq!(txn.product_id(), Some(product_id));
        assert_eq!(txn.transaction_type(), TransactionType::Addition);
        assert_eq!(txn.quantity(), 10);
        assert_eq!(txn.notes(), "Test notes");
        assert_eq!(txn.transaction_date(), clock.now());
        assert!(txn.id().is_none());
    }

    #[test]
    fn notes_default_to_empty() {
        let txn = InventoryTransaction::new(
            Some(ProductId::new()),
            TransactionType::Addition,
            5,
            &test_clock(),
        );
        assert_eq!(txn.notes(), "");
    }

    #[test]
    fn transaction_date_comes_from_clock_at_construction() {
        let clock = test_clock();
        let expected = clock.now();
        let txn = InventoryTransaction::new(None, TransactionType::Withdrawal, 10, &clock);

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(txn.transaction_date(), expected);
    }

    #[test]
    fn signed_quantity_follows_type() {
        let clock = test_clock();
        let add = InventoryTransaction::new(None, TransactionType::Addition, 7, &clock);
        let withdraw = InventoryTransaction::new(None, TransactionType::Withdrawal, 7, &clock);
        assert_eq!(add.signed_quantity(), 7);
        assert_eq!(withdraw.signed_quantity(), -7);
    }

    #[test]
    fn stamp_only_fills_missing_identifiers() {
        let clock = test_clock();
        let product_id = ProductId::new();
        let first_id = TransactionId::new();
        let mut txn = InventoryTransaction::new(None, TransactionType::Addition, 1, &clock);

        txn.stamp(product_id, &mut || first_id);
        assert_eq!(txn.product_id(), Some(product_id));
        assert_eq!(txn.id_typed(), Some(first_id));

        txn.stamp(ProductId::new(), &mut TransactionId::new);
        assert_eq!(txn.product_id(), Some(product_id));
        assert_eq!(txn.id_typed(), Some(first_id));
    }

    #[test]
    fn type_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionType::Withdrawal).unwrap();
        assert_eq!(json, "\"withdrawal\"");
        assert_eq!(TransactionType::Addition.to_string(), "addition");
    }
}
