//! Duplicate detection for order items.
//!
//! The checks here reject duplicates early with a clear error; the
//! `(order, product)` unique constraint in storage remains the final word.

use std::collections::HashSet;

use common::{OrderId, ProductId};
use store::{OrderItemRepository, StoreError, constraints};

use crate::error::{DomainError, Result};

/// Returns the first product id that appears more than once, in input order.
pub fn first_duplicate(ids: impl IntoIterator<Item = ProductId>) -> Option<ProductId> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

/// Rejects a request that names the same product twice.
pub fn ensure_distinct(ids: impl IntoIterator<Item = ProductId>) -> Result<()> {
    match first_duplicate(ids) {
        Some(id) => Err(DomainError::duplicate_item(id)),
        None => Ok(()),
    }
}

/// Rejects adding a product the order already holds.
pub async fn ensure_absent<R>(repo: &mut R, order_id: OrderId, product_id: ProductId) -> Result<()>
where
    R: OrderItemRepository + ?Sized,
{
    if repo.order_item_exists(order_id, product_id).await? {
        return Err(DomainError::duplicate_item(product_id));
    }
    Ok(())
}

/// Translates a lost race on the order item constraint into `DuplicateItem`.
pub fn item_conflict(err: StoreError, product_id: ProductId) -> DomainError {
    if err.is_unique_violation_of(constraints::ORDER_ITEM_UNIQUE) {
        tracing::debug!(%product_id, "order item unique constraint rejected insert");
        return DomainError::duplicate_item(product_id);
    }
    DomainError::Store(err)
}
