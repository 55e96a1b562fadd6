//! Order aggregate and related types.

mod aggregate;
mod commands;
mod service;
mod view;

pub use aggregate::{OrderAggregate, validate_quantity};
pub use commands::{AddProduct, CreateOrder, ItemRequest};
pub use service::OrderService;
pub use view::{OrderItemView, OrderView};
