use std::collections::HashMap;

use async_trait::async_trait;
use common::{ClientId, OrderId, Page, ProductId};

use crate::Result;
use crate::model::{Client, NewOrder, Order, OrderDetails, OrderItem, OrderStatus, Product};
use crate::query::{ClientField, OrderField, ProductField, Query};

/// Client persistence.
#[async_trait]
pub trait ClientRepository: Send {
    async fn insert_client(&mut self, client: &Client) -> Result<()>;

    /// Overwrites every column of an existing client. Returns the number of rows changed.
    async fn update_client(&mut self, client: &Client) -> Result<u64>;

    /// Returns the number of rows deleted. Fails with a foreign key
    /// violation while orders still reference the client.
    async fn delete_client(&mut self, id: ClientId) -> Result<u64>;

    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>>;

    /// Case-insensitive email lookup, optionally ignoring one client.
    async fn client_email_exists(&mut self, email: &str, excluding: Option<ClientId>)
    -> Result<bool>;

    async fn search_clients(&mut self, query: &Query<ClientField>) -> Result<Page<Client>>;

    /// Number of orders per client, in one grouped query.
    ///
    /// Clients without orders are absent from the map.
    async fn count_orders_by_client(&mut self, ids: &[ClientId]) -> Result<HashMap<ClientId, u64>>;
}

/// Product persistence.
#[async_trait]
pub trait ProductRepository: Send {
    async fn insert_product(&mut self, product: &Product) -> Result<()>;

    async fn update_product(&mut self, product: &Product) -> Result<u64>;

    /// Returns the number of rows deleted. Fails with a foreign key
    /// violation while order items still reference the product.
    async fn delete_product(&mut self, id: ProductId) -> Result<u64>;

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Fetches every existing product among `ids` in one query. Order is unspecified.
    async fn find_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Case-insensitive name lookup, optionally ignoring one product.
    async fn product_name_exists(&mut self, name: &str, excluding: Option<ProductId>)
    -> Result<bool>;

    async fn search_products(&mut self, query: &Query<ProductField>) -> Result<Page<Product>>;
}

/// Order persistence.
#[async_trait]
pub trait OrderRepository: Send {
    /// Writes the order and all of its items as one unit.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<()>;

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<u64>;

    /// Deletes the order and, by cascade, its items. Returns the number of orders deleted.
    async fn delete_order(&mut self, id: OrderId) -> Result<u64>;

    /// Shallow fetch: the order row only.
    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Detailed fetch with the client and every item's product loaded.
    async fn find_order_details(&mut self, id: OrderId) -> Result<Option<OrderDetails>>;

    /// Detailed fetch of many orders with a fixed number of queries.
    ///
    /// Missing ids are skipped. Order is unspecified.
    async fn find_order_details_in(&mut self, ids: &[OrderId]) -> Result<Vec<OrderDetails>>;

    async fn search_orders(&mut self, query: &Query<OrderField>) -> Result<Page<Order>>;

    async fn order_exists_for_client(&mut self, client_id: ClientId) -> Result<bool>;
}

/// Order item persistence, addressed by the `(order, product)` pair.
#[async_trait]
pub trait OrderItemRepository: Send {
    async fn order_item_exists(&mut self, order_id: OrderId, product_id: ProductId)
    -> Result<bool>;

    async fn find_order_item(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<OrderItem>>;

    /// Fails with a unique violation if the pair is already present.
    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()>;

    async fn update_order_item_quantity(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<u64>;

    /// Returns the number of rows deleted (zero or one).
    async fn delete_order_item(&mut self, order_id: OrderId, product_id: ProductId)
    -> Result<u64>;

    async fn order_item_exists_for_product(&mut self, product_id: ProductId) -> Result<bool>;
}

/// A unit of work spanning every repository.
///
/// Reads observe a consistent snapshot. Writes become visible only after
/// [`Transaction::commit`]; dropping the transaction rolls it back.
#[async_trait]
pub trait Transaction:
    ClientRepository + ProductRepository + OrderRepository + OrderItemRepository + Send
{
    async fn commit(self) -> Result<()>;
}

/// Entry point of a storage backend.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: Transaction;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}
