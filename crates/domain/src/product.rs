//! Product service.

use common::{Page, PageRequest, ProductId, RequestContext, Sort};
use rust_decimal::Decimal;
use store::{
    OrderItemRepository, Product, ProductField, ProductRepository, Query, Store, Transaction,
    constraints,
};

use crate::error::{DomainError, EntityKind, Result};
use crate::filter::ProductFilter;

/// Product attributes supplied on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Decimal,
}

impl ProductDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::invalid("name must not be blank"));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::invalid("description must not be blank"));
        }
        if self.price.is_sign_negative() {
            return Err(DomainError::invalid("price must not be negative"));
        }
        Ok(())
    }

    fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price: self.price.round_dp(2),
        }
    }
}

fn name_conflict(err: store::StoreError, name: &str) -> DomainError {
    if err.is_unique_violation_of(constraints::PRODUCT_NAME_UNIQUE) {
        return DomainError::duplicate_identity("name", name);
    }
    DomainError::Store(err)
}

/// Service for managing products.
pub struct ProductService<S: Store> {
    store: S,
}

impl<S: Store> ProductService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn create(&self, ctx: &RequestContext, draft: ProductDraft) -> Result<Product> {
        draft.validate()?;
        let product = draft.into_product(ProductId::new());

        let mut tx = self.store.begin().await?;
        if tx.product_name_exists(&product.name, None).await? {
            return Err(DomainError::duplicate_identity("name", product.name));
        }
        tx.insert_product(&product)
            .await
            .map_err(|e| name_conflict(e, &product.name))?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn get_one(&self, ctx: &RequestContext, id: ProductId) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Product, id))?;
        tx.commit().await?;
        Ok(product)
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<Product> {
        draft.validate()?;
        let product = draft.into_product(id);

        let mut tx = self.store.begin().await?;
        if tx.find_product(id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Product, id));
        }
        if tx.product_name_exists(&product.name, Some(id)).await? {
            return Err(DomainError::duplicate_identity("name", product.name));
        }
        tx.update_product(&product)
            .await
            .map_err(|e| name_conflict(e, &product.name))?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "product updated");
        Ok(product)
    }

    /// Deletes a product no order item references.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn delete(&self, ctx: &RequestContext, id: ProductId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if tx.find_product(id).await?.is_none() {
            return Err(DomainError::not_found(EntityKind::Product, id));
        }
        if tx.order_item_exists_for_product(id).await? {
            return Err(DomainError::in_use(EntityKind::Product, id));
        }
        tx.delete_product(id).await.map_err(|e| {
            if e.is_foreign_key_violation_of(constraints::ORDER_ITEM_PRODUCT_FK) {
                DomainError::in_use(EntityKind::Product, id)
            } else {
                DomainError::Store(e)
            }
        })?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Lists products, by name unless `page` says otherwise.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn find_all(
        &self,
        ctx: &RequestContext,
        filter: ProductFilter,
        mut page: PageRequest<ProductField>,
    ) -> Result<Page<Product>> {
        if page.sort.is_empty() {
            page = page.sorted_by(Sort::asc(ProductField::Name));
        }
        let query = Query::new(filter.predicate(), page);

        let mut tx = self.store.begin().await?;
        let products = tx.search_products(&query).await?;
        tx.commit().await?;
        Ok(products)
    }
}
