//! Persistence for clients, products, orders and order items.
//!
//! Every operation runs inside a [`Transaction`] obtained from a [`Store`].
//! Two backends are provided: [`InMemoryStore`] for tests and local runs,
//! and [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use model::{
    Client, NewOrder, Order, OrderDetails, OrderItem, OrderLine, OrderStatus, Product,
    UnknownStatus, constraints,
};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::{ClientField, Field, OrderField, Predicate, ProductField, Query, Relation, Value};
pub use store::{
    ClientRepository, OrderItemRepository, OrderRepository, ProductRepository, Store, Transaction,
};
