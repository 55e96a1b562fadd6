use std::collections::HashMap;

use async_trait::async_trait;
use common::{ClientId, Direction, OrderId, OrderItemId, Page, ProductId};
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::model::{
    Client, NewOrder, Order, OrderDetails, OrderItem, OrderLine, OrderStatus, Product, sort_lines,
};
use crate::query::{ClientField, Field, OrderField, Predicate, ProductField, Query, Value};
use crate::store::{
    ClientRepository, OrderItemRepository, OrderRepository, ProductRepository, Store, Transaction,
};
use crate::{Result, StoreError};

const CLIENT_COLUMNS: &str = "clients.id, clients.first_name, clients.last_name, clients.email, clients.phone";
const PRODUCT_COLUMNS: &str = "products.id, products.name, products.description, products.price";
const ORDER_COLUMNS: &str = "orders.id, orders.created_at, orders.status, orders.client_id";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::debug!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }
}

/// Transaction over a [`PostgresStore`]. Rolled back when dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &Value) {
    match value {
        Value::Text(text) => qb.push_bind(text.clone()),
        Value::Uuid(id) => qb.push_bind(*id),
        Value::Decimal(amount) => qb.push_bind(*amount),
        Value::Timestamp(at) => qb.push_bind(*at),
        Value::Status(status) => qb.push_bind(status.as_str()),
    };
}

/// Escapes `LIKE` wildcards so the needle matches literally.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_exists<F: Field>(qb: &mut QueryBuilder<'_, Postgres>, table: &str, field: F, value: &Value) {
    match field.relation() {
        Some(relation) => {
            qb.push(format!(
                "EXISTS (SELECT 1 FROM {} r WHERE r.{} = {table}.id AND r.{} = ",
                relation.table,
                relation.foreign_key,
                field.column()
            ));
            push_value(qb, value);
            qb.push(")");
        }
        None => {
            qb.push(format!("{table}.{} = ", field.column()));
            push_value(qb, value);
        }
    }
}

/// Lowers a predicate into a SQL boolean expression over `table`.
fn push_predicate<F: Field>(
    qb: &mut QueryBuilder<'_, Postgres>,
    table: &str,
    predicate: &Predicate<F>,
) {
    match predicate {
        Predicate::Always => {
            qb.push("TRUE");
        }
        Predicate::Equals(field, value) | Predicate::HasRelated(field, value) => {
            push_exists(qb, table, *field, value);
        }
        Predicate::ContainsText(field, needle) => {
            qb.push(format!("LOWER({table}.{}) LIKE ", field.column()));
            qb.push_bind(like_pattern(needle));
            qb.push(" ESCAPE '\\'");
        }
        Predicate::Range { field, from, to } => {
            let column = format!("{table}.{}", field.column());
            match (from, to) {
                (Some(from), Some(to)) => {
                    qb.push(format!("{column} BETWEEN "));
                    push_value(qb, from);
                    qb.push(" AND ");
                    push_value(qb, to);
                }
                (Some(from), None) => {
                    qb.push(format!("{column} >= "));
                    push_value(qb, from);
                }
                (None, Some(to)) => {
                    qb.push(format!("{column} <= "));
                    push_value(qb, to);
                }
                (None, None) => {
                    qb.push("TRUE");
                }
            }
        }
        Predicate::And(inner) if inner.is_empty() => {
            qb.push("TRUE");
        }
        Predicate::And(inner) => {
            qb.push("(");
            for (i, p) in inner.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                push_predicate(qb, table, p);
            }
            qb.push(")");
        }
    }
}

/// Appends ` WHERE <predicate>`, or nothing when the predicate matches every row.
fn push_where<F: Field>(qb: &mut QueryBuilder<'_, Postgres>, table: &str, predicate: &Predicate<F>) {
    if predicate.is_always() {
        return;
    }
    qb.push(" WHERE ");
    push_predicate(qb, table, predicate);
}

fn push_order_by<F: Field>(qb: &mut QueryBuilder<'_, Postgres>, table: &str, query: &Query<F>) {
    qb.push(" ORDER BY ");
    for sort in query.page.sort.iter().filter(|s| s.field.relation().is_none()) {
        let direction = match sort.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        qb.push(format!("{table}.{} {direction}, ", sort.field.column()));
    }
    qb.push(format!("{table}.id ASC"));
}

/// Runs the count and the page select for one entity table.
async fn search<F: Field, T>(
    conn: &mut PgConnection,
    table: &str,
    columns: &str,
    query: &Query<F>,
    decode: fn(&PgRow) -> Result<T>,
) -> Result<Page<T>> {
    let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {table}"));
    push_where(&mut count, table, &query.predicate);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let page = &query.page;
    if total == 0 {
        return Ok(Page::empty(page.page, page.size));
    }

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {columns} FROM {table}"));
    push_where(&mut select, table, &query.predicate);
    push_order_by(&mut select, table, query);
    select.push(" LIMIT ");
    select.push_bind(page.limit() as i64);
    select.push(" OFFSET ");
    select.push_bind(page.offset() as i64);

    let rows = select.build().fetch_all(&mut *conn).await?;
    let content = rows.iter().map(decode).collect::<Result<Vec<_>>>()?;
    tracing::debug!(table, total, returned = content.len(), "search executed");

    Ok(Page::new(content, page.page, page.size, total as u64))
}

fn row_to_client(row: &PgRow) -> Result<Client> {
    Ok(Client {
        id: ClientId::from_uuid(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
    })
}

fn row_to_status(row: &PgRow) -> Result<OrderStatus> {
    let raw: String = row.try_get("status")?;
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown order status {raw:?}")))
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        created_at: row.try_get("created_at")?,
        status: row_to_status(row)?,
        client_id: ClientId::from_uuid(row.try_get("client_id")?),
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
    })
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

#[async_trait]
impl ClientRepository for PostgresTransaction {
    async fn insert_client(&mut self, client: &Client) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, first_name, last_name, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.phone)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_client(&mut self, client: &Client) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET first_name = $2, last_name = $3, email = $4, phone = $5
            WHERE id = $1
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.phone)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_client(&mut self, id: ClientId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_client).transpose()
    }

    async fn client_email_exists(
        &mut self,
        email: &str,
        excluding: Option<ClientId>,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM clients
                WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(excluding.map(|id| id.as_uuid()))
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn search_clients(&mut self, query: &Query<ClientField>) -> Result<Page<Client>> {
        search(&mut self.tx, "clients", CLIENT_COLUMNS, query, row_to_client).await
    }

    async fn count_orders_by_client(&mut self, ids: &[ClientId]) -> Result<HashMap<ClientId, u64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT client_id, COUNT(*) AS orders
            FROM orders
            WHERE client_id = ANY($1)
            GROUP BY client_id
            "#,
        )
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| {
                let id = ClientId::from_uuid(row.try_get("client_id")?);
                let count: i64 = row.try_get("orders")?;
                Ok((id, count.max(0) as u64))
            })
            .collect()
    }
}

#[async_trait]
impl ProductRepository for PostgresTransaction {
    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4 WHERE id = $1",
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(uuids(ids))
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn product_name_exists(
        &mut self,
        name: &str,
        excluding: Option<ProductId>,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM products
                WHERE LOWER(name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(excluding.map(|id| id.as_uuid()))
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn search_products(&mut self, query: &Query<ProductField>) -> Result<Page<Product>> {
        search(&mut self.tx, "products", PRODUCT_COLUMNS, query, row_to_product).await
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    async fn insert_order(&mut self, new_order: &NewOrder) -> Result<()> {
        let order = &new_order.order;
        sqlx::query(
            r#"
            INSERT INTO orders (id, created_at, status, client_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.created_at)
        .bind(order.status.as_str())
        .bind(order.client_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;

        if new_order.items.is_empty() {
            return Ok(());
        }

        let mut insert =
            QueryBuilder::<Postgres>::new("INSERT INTO order_items (id, order_id, product_id, quantity) ");
        insert.push_values(&new_order.items, |mut row, item| {
            row.push_bind(item.id.as_uuid())
                .push_bind(item.order_id.as_uuid())
                .push_bind(item.product_id.as_uuid())
                .push_bind(item.quantity);
        });
        insert.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<u64> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_order_details(&mut self, id: OrderId) -> Result<Option<OrderDetails>> {
        Ok(self.find_order_details_in(&[id]).await?.into_iter().next())
    }

    async fn find_order_details_in(&mut self, ids: &[OrderId]) -> Result<Vec<OrderDetails>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = uuids(ids);

        let order_rows = sqlx::query(
            r#"
            SELECT o.id, o.created_at, o.status, o.client_id,
                   c.first_name, c.last_name, c.email, c.phone
            FROM orders o
            JOIN clients c ON c.id = o.client_id
            WHERE o.id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let line_rows = sqlx::query(
            r#"
            SELECT i.id, i.order_id, i.product_id, i.quantity,
                   p.name, p.description, p.price
            FROM order_items i
            JOIN products p ON p.id = i.product_id
            WHERE i.order_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let item = row_to_item(row)?;
            let product = Product {
                id: item.product_id,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                price: row.try_get("price")?,
            };
            lines
                .entry(item.order_id)
                .or_default()
                .push(OrderLine { item, product });
        }

        order_rows
            .iter()
            .map(|row| {
                let order = row_to_order(row)?;
                let client = Client {
                    id: order.client_id,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                    email: row.try_get("email")?,
                    phone: row.try_get("phone")?,
                };
                let mut order_lines = lines.remove(&order.id).unwrap_or_default();
                sort_lines(&mut order_lines);
                Ok(OrderDetails {
                    order,
                    client,
                    lines: order_lines,
                })
            })
            .collect()
    }

    async fn search_orders(&mut self, query: &Query<OrderField>) -> Result<Page<Order>> {
        search(&mut self.tx, "orders", ORDER_COLUMNS, query, row_to_order).await
    }

    async fn order_exists_for_client(&mut self, client_id: ClientId) -> Result<bool> {
        let exists = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE client_id = $1)")
            .bind(client_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl OrderItemRepository for PostgresTransaction {
    async fn order_item_exists(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM order_items WHERE order_id = $1 AND product_id = $2)",
        )
        .bind(order_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn find_order_item(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<Option<OrderItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity
            FROM order_items
            WHERE order_id = $1 AND product_id = $2
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order_item_quantity(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE order_items SET quantity = $3 WHERE order_id = $1 AND product_id = $2",
        )
        .bind(order_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_order_item(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND product_id = $2")
            .bind(order_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn order_item_exists_for_product(&mut self, product_id: ProductId) -> Result<bool> {
        let exists =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)")
                .bind(product_id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }
}
