use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ClientId, Direction, OrderId, OrderItemId, Page, ProductId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::model::{
    Client, NewOrder, Order, OrderDetails, OrderItem, OrderLine, OrderStatus, Product,
    constraints, sort_lines,
};
use crate::query::{ClientField, Field, OrderField, ProductField, Query, Value};
use crate::store::{
    ClientRepository, OrderItemRepository, OrderRepository, ProductRepository, Store, Transaction,
};
use crate::{Result, StoreError};

#[derive(Debug, Clone, Default)]
struct Tables {
    clients: HashMap<ClientId, Client>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderItemId, OrderItem>,
}

impl Tables {
    fn item_by_pair(&self, order_id: OrderId, product_id: ProductId) -> Option<&OrderItem> {
        self.items
            .values()
            .find(|i| i.order_id == order_id && i.product_id == product_id)
    }

    fn check_item(&self, item: &OrderItem) -> Result<()> {
        if !self.orders.contains_key(&item.order_id) {
            return Err(fk(constraints::ORDER_ITEM_ORDER_FK));
        }
        if !self.products.contains_key(&item.product_id) {
            return Err(fk(constraints::ORDER_ITEM_PRODUCT_FK));
        }
        if self.item_by_pair(item.order_id, item.product_id).is_some() {
            return Err(unique(constraints::ORDER_ITEM_UNIQUE));
        }
        Ok(())
    }

    fn details(&self, order: &Order) -> Result<OrderDetails> {
        let client = self.clients.get(&order.client_id).cloned().ok_or_else(|| {
            StoreError::Corrupt(format!("order {} references missing client", order.id))
        })?;

        let mut lines = self
            .items
            .values()
            .filter(|i| i.order_id == order.id)
            .map(|item| {
                let product = self.products.get(&item.product_id).cloned().ok_or_else(|| {
                    StoreError::Corrupt(format!("item {} references missing product", item.id))
                })?;
                Ok(OrderLine {
                    item: item.clone(),
                    product,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_lines(&mut lines);

        Ok(OrderDetails {
            order: order.clone(),
            client,
            lines,
        })
    }

    fn order_values(&self, order: &Order, field: OrderField) -> Vec<Value> {
        match field {
            OrderField::Id => vec![Value::Uuid(order.id.as_uuid())],
            OrderField::CreatedAt => vec![Value::Timestamp(order.created_at)],
            OrderField::Status => vec![Value::Status(order.status)],
            OrderField::ClientId => vec![Value::Uuid(order.client_id.as_uuid())],
            OrderField::ProductId => self
                .items
                .values()
                .filter(|i| i.order_id == order.id)
                .map(|i| Value::Uuid(i.product_id.as_uuid()))
                .collect(),
        }
    }
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn fk(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

fn client_values(client: &Client, field: ClientField) -> Vec<Value> {
    let value = match field {
        ClientField::Id => Value::Uuid(client.id.as_uuid()),
        ClientField::FirstName => Value::Text(client.first_name.clone()),
        ClientField::LastName => Value::Text(client.last_name.clone()),
        ClientField::Email => Value::Text(client.email.clone()),
        ClientField::Phone => Value::Text(client.phone.clone()),
    };
    vec![value]
}

fn product_values(product: &Product, field: ProductField) -> Vec<Value> {
    let value = match field {
        ProductField::Id => Value::Uuid(product.id.as_uuid()),
        ProductField::Name => Value::Text(product.name.clone()),
        ProductField::Price => Value::Decimal(product.price),
    };
    vec![value]
}

/// Filters, sorts and slices `rows` the way the SQL backend does.
///
/// Related fields are ignored as sort keys; the row id is always the final
/// tie-breaker so paging is stable.
fn paginate<T: Clone, F: Field>(
    rows: impl Iterator<Item = T>,
    query: &Query<F>,
    values: impl Fn(&T, F) -> Vec<Value>,
    key: impl Fn(&T) -> Uuid,
) -> Page<T> {
    let mut matched: Vec<T> = rows
        .filter(|row| query.predicate.matches(&|f| values(row, f)))
        .collect();

    matched.sort_by(|a, b| {
        for sort in query.page.sort.iter().filter(|s| s.field.relation().is_none()) {
            let left = values(a, sort.field);
            let right = values(b, sort.field);
            let ordering = match (left.first(), right.first()) {
                (Some(l), Some(r)) => l.compare(r).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            let ordering = match sort.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        key(a).cmp(&key(b))
    });

    let total = matched.len() as u64;
    let content = matched
        .into_iter()
        .skip(query.page.offset() as usize)
        .take(query.page.limit() as usize)
        .collect();

    Page::new(content, query.page.page, query.page.size, total)
}

/// In-memory store for tests and local development only.
///
/// Implements the same interface and constraint names as the PostgreSQL
/// store. Transactions are fully serialized: `begin` takes the single lock
/// and works on a copy that `commit` publishes, so a second `begin` waits
/// until the first transaction is committed or dropped. Concurrent requests
/// against this store run one at a time; use [`crate::PostgresStore`] for
/// anything serving real traffic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of order items stored.
    pub async fn order_item_count(&self) -> usize {
        self.tables.lock().await.items.len()
    }

    /// Returns the number of items stored for one order.
    pub async fn order_item_count_for(&self, order_id: OrderId) -> usize {
        self.tables
            .lock()
            .await
            .items
            .values()
            .filter(|i| i.order_id == order_id)
            .count()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<()> {
        let Self { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl ClientRepository for InMemoryTransaction {
    async fn insert_client(&mut self, client: &Client) -> Result<()> {
        let email = client.email.to_lowercase();
        if self
            .working
            .clients
            .values()
            .any(|c| c.email.to_lowercase() == email)
        {
            return Err(unique(constraints::CLIENT_EMAIL_UNIQUE));
        }
        self.working.clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn update_client(&mut self, client: &Client) -> Result<u64> {
        let email = client.email.to_lowercase();
        if self
            .working
            .clients
            .values()
            .any(|c| c.id != client.id && c.email.to_lowercase() == email)
        {
            return Err(unique(constraints::CLIENT_EMAIL_UNIQUE));
        }
        match self.working.clients.get_mut(&client.id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_client(&mut self, id: ClientId) -> Result<u64> {
        if self.working.orders.values().any(|o| o.client_id == id) {
            return Err(fk(constraints::ORDER_CLIENT_FK));
        }
        Ok(self.working.clients.remove(&id).map_or(0, |_| 1))
    }

    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>> {
        Ok(self.working.clients.get(&id).cloned())
    }

    async fn client_email_exists(
        &mut self,
        email: &str,
        excluding: Option<ClientId>,
    ) -> Result<bool> {
        let email = email.to_lowercase();
        Ok(self
            .working
            .clients
            .values()
            .any(|c| Some(c.id) != excluding && c.email.to_lowercase() == email))
    }

    async fn search_clients(&mut self, query: &Query<ClientField>) -> Result<Page<Client>> {
        Ok(paginate(
            self.working.clients.values().cloned(),
            query,
            client_values,
            |c| c.id.as_uuid(),
        ))
    }

    async fn count_orders_by_client(&mut self, ids: &[ClientId]) -> Result<HashMap<ClientId, u64>> {
        let mut counts = HashMap::new();
        for order in self.working.orders.values() {
            if ids.contains(&order.client_id) {
                *counts.entry(order.client_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl ProductRepository for InMemoryTransaction {
    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        let name = product.name.to_lowercase();
        if self
            .working
            .products
            .values()
            .any(|p| p.name.to_lowercase() == name)
        {
            return Err(unique(constraints::PRODUCT_NAME_UNIQUE));
        }
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<u64> {
        let name = product.name.to_lowercase();
        if self
            .working
            .products
            .values()
            .any(|p| p.id != product.id && p.name.to_lowercase() == name)
        {
            return Err(unique(constraints::PRODUCT_NAME_UNIQUE));
        }
        match self.working.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<u64> {
        if self.working.items.values().any(|i| i.product_id == id) {
            return Err(fk(constraints::ORDER_ITEM_PRODUCT_FK));
        }
        Ok(self.working.products.remove(&id).map_or(0, |_| 1))
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn find_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.products.get(id).cloned())
            .collect())
    }

    async fn product_name_exists(
        &mut self,
        name: &str,
        excluding: Option<ProductId>,
    ) -> Result<bool> {
        let name = name.to_lowercase();
        Ok(self
            .working
            .products
            .values()
            .any(|p| Some(p.id) != excluding && p.name.to_lowercase() == name))
    }

    async fn search_products(&mut self, query: &Query<ProductField>) -> Result<Page<Product>> {
        Ok(paginate(
            self.working.products.values().cloned(),
            query,
            product_values,
            |p| p.id.as_uuid(),
        ))
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn insert_order(&mut self, new_order: &NewOrder) -> Result<()> {
        let order = &new_order.order;
        if !self.working.clients.contains_key(&order.client_id) {
            return Err(fk(constraints::ORDER_CLIENT_FK));
        }
        // Items are checked against a scratch copy so a failure leaves no partial order.
        let mut scratch = self.working.clone();
        scratch.orders.insert(order.id, order.clone());
        for item in &new_order.items {
            scratch.check_item(item)?;
            scratch.items.insert(item.id, item.clone());
        }
        self.working = scratch;
        Ok(())
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<u64> {
        match self.working.orders.get_mut(&id) {
            Some(order) => {
                order.status = status;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<u64> {
        if self.working.orders.remove(&id).is_none() {
            return Ok(0);
        }
        self.working.items.retain(|_, i| i.order_id != id);
        Ok(1)
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn find_order_details(&mut self, id: OrderId) -> Result<Option<OrderDetails>> {
        self.working
            .orders
            .get(&id)
            .map(|order| self.working.details(order))
            .transpose()
    }

    async fn find_order_details_in(&mut self, ids: &[OrderId]) -> Result<Vec<OrderDetails>> {
        ids.iter()
            .filter_map(|id| self.working.orders.get(id))
            .map(|order| self.working.details(order))
            .collect()
    }

    async fn search_orders(&mut self, query: &Query<OrderField>) -> Result<Page<Order>> {
        let tables = &self.working;
        Ok(paginate(
            tables.orders.values().cloned(),
            query,
            |order, field| tables.order_values(order, field),
            |o| o.id.as_uuid(),
        ))
    }

    async fn order_exists_for_client(&mut self, client_id: ClientId) -> Result<bool> {
        Ok(self
            .working
            .orders
            .values()
            .any(|o| o.client_id == client_id))
    }
}

#[async_trait]
impl OrderItemRepository for InMemoryTransaction {
    async fn order_item_exists(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<bool> {
        Ok(self.working.item_by_pair(order_id, product_id).is_some())
    }

    async fn find_order_item(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<OrderItem>> {
        Ok(self.working.item_by_pair(order_id, product_id).cloned())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        self.working.check_item(item)?;
        self.working.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_order_item_quantity(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<u64> {
        let item = self
            .working
            .items
            .values_mut()
            .find(|i| i.order_id == order_id && i.product_id == product_id);
        match item {
            Some(item) => {
                item.quantity = quantity;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_order_item(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<u64> {
        let before = self.working.items.len();
        self.working
            .items
            .retain(|_, i| !(i.order_id == order_id && i.product_id == product_id));
        Ok((before - self.working.items.len()) as u64)
    }

    async fn order_item_exists_for_product(&mut self, product_id: ProductId) -> Result<bool> {
        Ok(self
            .working
            .items
            .values()
            .any(|i| i.product_id == product_id))
    }
}
