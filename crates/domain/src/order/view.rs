//! Read models returned by the order service.

use chrono::{DateTime, Utc};
use common::{ClientId, OrderId, ProductId};
use rust_decimal::Decimal;
use store::{OrderDetails, OrderLine, OrderStatus};

/// One line of an [`OrderView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemView {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<&OrderLine> for OrderItemView {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product.id,
            name: line.product.name.clone(),
            quantity: line.item.quantity,
            price: line.product.price,
        }
    }
}

/// An order as seen by callers, built from a detailed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderView {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub client_id: ClientId,
    /// Lines ordered by product name.
    pub items: Vec<OrderItemView>,
    /// Sum of the quantities of every line.
    pub items_total: i64,
}

impl OrderView {
    /// Returns the line for a product, if present.
    pub fn item(&self, product_id: ProductId) -> Option<&OrderItemView> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

impl From<OrderDetails> for OrderView {
    fn from(details: OrderDetails) -> Self {
        let items: Vec<OrderItemView> = details.lines.iter().map(OrderItemView::from).collect();
        let items_total = items.iter().map(|i| i64::from(i.quantity)).sum();
        Self {
            id: details.order.id,
            created_at: details.order.created_at,
            status: details.order.status,
            client_id: details.client.id,
            items,
            items_total,
        }
    }
}
