//! Order aggregate used to assemble a new order before it is persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use common::{ClientId, OrderId, ProductId};
use store::{NewOrder, Order, OrderItem, OrderStatus};

use crate::error::{DomainError, Result};

/// Rejects quantities below one.
pub fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(DomainError::invalid(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    Ok(())
}

/// A new order and its items.
///
/// Items are keyed by product id, so one order can never hold the same
/// product twice.
#[derive(Debug, Clone)]
pub struct OrderAggregate {
    id: OrderId,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    client_id: ClientId,
    items: BTreeMap<ProductId, i32>,
}

impl OrderAggregate {
    /// Starts an empty order for `client_id`, stamped with the current time.
    ///
    /// The timestamp is truncated to microseconds to match what the
    /// database stores.
    pub fn new(client_id: ClientId, status: OrderStatus) -> Self {
        Self {
            id: OrderId::new(),
            created_at: Utc::now().trunc_subsecs(6),
            status,
            client_id,
            items: BTreeMap::new(),
        }
    }

    /// Returns the id assigned at construction.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the creation time, truncated to microseconds.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the initial status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the client placing the order.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Returns the quantity held for a product.
    pub fn quantity_of(&self, product_id: ProductId) -> Option<i32> {
        self.items.get(&product_id).copied()
    }

    /// Returns the number of distinct products held.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the sum of all item quantities.
    pub fn total_quantity(&self) -> i64 {
        self.items.values().map(|q| i64::from(*q)).sum()
    }

    /// Adds a product line.
    pub fn add_item(&mut self, product_id: ProductId, quantity: i32) -> Result<()> {
        validate_quantity(quantity)?;
        if self.quantity_of(product_id).is_some() {
            return Err(DomainError::duplicate_item(product_id));
        }
        self.items.insert(product_id, quantity);
        Ok(())
    }

    /// Converts the aggregate into the rows written by the store.
    pub fn into_new_order(self) -> NewOrder {
        let items = self
            .items
            .iter()
            .map(|(product_id, quantity)| OrderItem::new(self.id, *product_id, *quantity))
            .collect();
        NewOrder {
            order: Order {
                id: self.id,
                created_at: self.created_at,
                status: self.status,
                client_id: self.client_id,
            },
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_has_no_items() {
        let order = OrderAggregate::new(ClientId::new(), OrderStatus::New);
        assert_eq!(order.item_count(), 0);
        assert_eq!(order.total_quantity(), 0);
        assert_eq!(order.status(), OrderStatus::New);
        assert_eq!(order.created_at().timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn add_item_rejects_repeated_product() {
        let mut order = OrderAggregate::new(ClientId::new(), OrderStatus::New);
        let product_id = ProductId::new();
        order.add_item(product_id, 2).unwrap();

        let result = order.add_item(product_id, 1);
        assert!(matches!(result, Err(DomainError::DuplicateItem { .. })));
        assert_eq!(order.quantity_of(product_id), Some(2));
    }

    #[test]
    fn add_item_rejects_non_positive_quantity() {
        let mut order = OrderAggregate::new(ClientId::new(), OrderStatus::New);
        assert!(matches!(
            order.add_item(ProductId::new(), 0),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(order.add_item(ProductId::new(), -3).is_err());
        assert_eq!(order.item_count(), 0);
    }

    #[test]
    fn into_new_order_links_items_to_the_order() {
        let client_id = ClientId::new();
        let mut order = OrderAggregate::new(client_id, OrderStatus::Processing);
        order.add_item(ProductId::new(), 1).unwrap();
        order.add_item(ProductId::new(), 4).unwrap();
        let order_id = order.id();
        assert_eq!(order.total_quantity(), 5);

        let new_order = order.into_new_order();
        assert_eq!(new_order.order.id, order_id);
        assert_eq!(new_order.order.client_id, client_id);
        assert_eq!(new_order.order.status, OrderStatus::Processing);
        assert_eq!(new_order.items.len(), 2);
        assert!(new_order.items.iter().all(|i| i.order_id == order_id));
    }
}
