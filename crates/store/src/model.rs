//! Records persisted by the store.

use chrono::{DateTime, Utc};
use common::{ClientId, OrderId, OrderItemId, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Names of the constraints shared by every backend.
///
/// The PostgreSQL schema in `migrations/` declares these names and the
/// in-memory store reports the same ones, so callers can classify
/// violations without knowing which backend is in use.
pub mod constraints {
    pub const CLIENT_EMAIL_UNIQUE: &str = "clients_email_key";
    pub const PRODUCT_NAME_UNIQUE: &str = "products_name_key";
    pub const ORDER_ITEM_UNIQUE: &str = "order_items_order_product_key";
    pub const ORDER_CLIENT_FK: &str = "orders_client_id_fkey";
    pub const ORDER_ITEM_PRODUCT_FK: &str = "order_items_product_id_fkey";
    pub const ORDER_ITEM_ORDER_FK: &str = "order_items_order_id_fkey";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
}

/// Lifecycle status of an order.
///
/// Any status may be replaced by any other; no transition table is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    New,
    Processing,
    Completed,
    Canceled,
}

impl OrderStatus {
    /// Returns the stored (and wire) name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELED" => Ok(OrderStatus::Canceled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognised status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// Shallow order row, without its client or items resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub client_id: ClientId,
}

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
}

impl OrderItem {
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: i32) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            product_id,
            quantity,
        }
    }
}

/// An order together with the items it owns, written as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// An order item joined with its product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item: OrderItem,
    pub product: Product,
}

/// An order with its client and every item's product eagerly loaded.
///
/// Lines are ordered by product name, then product id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    pub order: Order,
    pub client: Client,
    pub lines: Vec<OrderLine>,
}

pub(crate) fn sort_lines(lines: &mut [OrderLine]) {
    lines.sort_by(|a, b| {
        a.product
            .name
            .cmp(&b.product.name)
            .then(a.product.id.cmp(&b.product.id))
    });
}
