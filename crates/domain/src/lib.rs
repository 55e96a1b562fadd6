//! Domain layer of the order management system.
//!
//! This crate provides the business operations on top of the store:
//! - Order aggregate and `OrderService` (create, item changes, status, listing)
//! - `ClientService` and `ProductService`
//! - Search filters lowered to store predicates
//! - Duplicate item detection and batched order counts

pub mod client;
pub mod counts;
pub mod error;
pub mod filter;
pub mod guard;
pub mod order;
pub mod product;

pub use client::{ClientDraft, ClientService, ClientView};
pub use error::{DomainError, EntityKind, Result};
pub use filter::{ClientFilter, OrderFilter, ProductFilter};
pub use order::{
    AddProduct, CreateOrder, ItemRequest, OrderAggregate, OrderItemView, OrderService, OrderView,
};
pub use product::{ProductDraft, ProductService};
