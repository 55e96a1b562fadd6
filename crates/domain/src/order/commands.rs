//! Order commands.

use common::{ClientId, ProductId};
use store::OrderStatus;

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl ItemRequest {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to create a new order with its items.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The client placing the order.
    pub client_id: ClientId,

    /// Initial status; `NEW` when absent.
    pub status: Option<OrderStatus>,

    /// The requested lines, in request order.
    pub items: Vec<ItemRequest>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command with the default status.
    pub fn new(client_id: ClientId, items: Vec<ItemRequest>) -> Self {
        Self {
            client_id,
            status: None,
            items,
        }
    }

    /// Sets the initial status.
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Command to add a product to an existing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddProduct {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl AddProduct {
    pub fn new(product_id: ProductId, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}
