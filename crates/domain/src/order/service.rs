//! Order service: the transactional operations on the order aggregate.

use std::collections::{HashMap, HashSet};

use common::{OrderId, Page, PageRequest, ProductId, RequestContext, Sort};
use store::{
    ClientRepository, OrderField, OrderItem, OrderItemRepository, OrderRepository, OrderStatus,
    ProductRepository, Query, Store, Transaction,
};

use crate::error::{DomainError, EntityKind, Result};
use crate::filter::OrderFilter;
use crate::guard;

use super::{AddProduct, CreateOrder, OrderAggregate, OrderView, validate_quantity};

/// Loads the detailed view of an order inside `tx`.
async fn load_view<T: Transaction>(tx: &mut T, order_id: OrderId) -> Result<OrderView> {
    tx.find_order_details(order_id)
        .await?
        .map(OrderView::from)
        .ok_or_else(|| DomainError::not_found(EntityKind::Order, order_id))
}

/// Service for managing orders.
///
/// Every operation runs in exactly one store transaction and returns the
/// order as re-read through the detailed fetch.
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order with its items.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn create(&self, ctx: &RequestContext, cmd: CreateOrder) -> Result<OrderView> {
        let mut tx = self.store.begin().await?;

        if tx.find_client(cmd.client_id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Client, cmd.client_id));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::invalid("order must contain at least one item"));
        }
        guard::ensure_distinct(cmd.items.iter().map(|i| i.product_id))?;

        let ids: Vec<ProductId> = cmd.items.iter().map(|i| i.product_id).collect();
        let found: HashSet<ProductId> = tx
            .find_products(&ids)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
            return Err(DomainError::not_found(EntityKind::Product, missing));
        }
        tracing::debug!(products = ids.len(), "referenced products loaded");

        let mut order = OrderAggregate::new(cmd.client_id, cmd.status.unwrap_or_default());
        for item in &cmd.items {
            order.add_item(item.product_id, item.quantity)?;
        }
        let order_id = order.id();
        tracing::debug!(%order_id, lines = order.item_count(), total = order.total_quantity(), "order aggregate built");
        tx.insert_order(&order.into_new_order()).await?;

        let view = load_view(&mut tx, order_id).await?;
        tx.commit().await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_id, items = view.items.len(), "order created");
        Ok(view)
    }

    /// Returns one order.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn get_one(&self, ctx: &RequestContext, order_id: OrderId) -> Result<OrderView> {
        let mut tx = self.store.begin().await?;
        let view = load_view(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Replaces the status of an order. Writing the current status again is a no-op.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn update_status(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderView> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .find_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Order, order_id))?;

        let changed = order.status != status;
        if changed {
            tx.update_order_status(order_id, status).await?;
        }

        let view = load_view(&mut tx, order_id).await?;
        tx.commit().await?;

        if changed {
            metrics::counter!("order_status_changes_total").increment(1);
            tracing::info!(%order_id, from = %order.status, to = %status, "order status changed");
        }
        Ok(view)
    }

    /// Deletes an order together with its items.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn delete(&self, ctx: &RequestContext, order_id: OrderId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if tx.delete_order(order_id).await? == 0 {
            return Err(DomainError::not_found(EntityKind::Order, order_id));
        }
        tx.commit().await?;

        metrics::counter!("orders_deleted_total").increment(1);
        tracing::info!(%order_id, "order deleted");
        Ok(())
    }

    /// Adds a product the order does not hold yet.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn add_product(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        cmd: AddProduct,
    ) -> Result<OrderView> {
        let mut tx = self.store.begin().await?;

        guard::ensure_absent(&mut tx, order_id, cmd.product_id).await?;
        if tx.find_order(order_id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Order, order_id));
        }
        if tx.find_product(cmd.product_id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Product, cmd.product_id));
        }
        validate_quantity(cmd.quantity)?;

        tx.insert_order_item(&OrderItem::new(order_id, cmd.product_id, cmd.quantity))
            .await
            .map_err(|e| guard::item_conflict(e, cmd.product_id))?;

        let view = load_view(&mut tx, order_id).await?;
        tx.commit().await?;

        metrics::counter!("order_items_added_total").increment(1);
        tracing::info!(%order_id, product_id = %cmd.product_id, quantity = cmd.quantity, "order item added");
        Ok(view)
    }

    /// Sets the quantity of a product already in the order.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn change_quantity(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<OrderView> {
        validate_quantity(quantity)?;

        let mut tx = self.store.begin().await?;
        let item = tx
            .find_order_item(order_id, product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::OrderItem, product_id))?;

        if item.quantity != quantity {
            tx.update_order_item_quantity(order_id, product_id, quantity)
                .await?;
            tracing::info!(%order_id, %product_id, from = item.quantity, to = quantity, "order item quantity changed");
        }

        let view = load_view(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Removes a product from the order.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn remove_product(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        product_id: ProductId,
    ) -> Result<OrderView> {
        let mut tx = self.store.begin().await?;
        if tx.delete_order_item(order_id, product_id).await? == 0 {
            return Err(DomainError::not_found(EntityKind::OrderItem, product_id));
        }

        let view = load_view(&mut tx, order_id).await?;
        tx.commit().await?;

        metrics::counter!("order_items_removed_total").increment(1);
        tracing::info!(%order_id, %product_id, "order item removed");
        Ok(view)
    }

    /// Lists orders matching `filter`, newest first unless `page` says otherwise.
    ///
    /// The page is resolved with one search and one batched detailed fetch.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn find_all(
        &self,
        ctx: &RequestContext,
        filter: OrderFilter,
        mut page: PageRequest<OrderField>,
    ) -> Result<Page<OrderView>> {
        if page.sort.is_empty() {
            page = page.sorted_by(Sort::desc(OrderField::CreatedAt));
        }
        let query = Query::new(filter.predicate(), page);

        let mut tx = self.store.begin().await?;
        let orders = tx.search_orders(&query).await?;
        if orders.is_empty() {
            return Ok(orders.with_content(Vec::new()));
        }

        let ids: Vec<OrderId> = orders.content.iter().map(|o| o.id).collect();
        let mut details: HashMap<OrderId, _> = tx
            .find_order_details_in(&ids)
            .await?
            .into_iter()
            .map(|d| (d.order.id, d))
            .collect();
        tx.commit().await?;

        let views = ids
            .iter()
            .filter_map(|id| details.remove(id))
            .map(OrderView::from)
            .collect();
        tracing::debug!(total = orders.total_elements, "orders listed");
        Ok(orders.with_content(views))
    }
}
