//! Product catalogue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use common::{Page, ProductId, RequestContext};
use domain::{DomainError, ProductDraft, ProductFilter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{Product, Store};

use super::params::{ApiJson, ListParams, parse_id};
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub price: Option<Decimal>,
}

impl TryFrom<ProductRequest> for ProductDraft {
    type Error = DomainError;

    fn try_from(req: ProductRequest) -> Result<Self, Self::Error> {
        let price = req
            .price
            .ok_or_else(|| DomainError::invalid("price must not be null"))?;
        Ok(ProductDraft {
            name: req.name,
            description: req.description,
            price,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
        }
    }
}

#[tracing::instrument(skip(state, ctx, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state.products.create(&ctx, req.try_into()?).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

#[tracing::instrument(skip(state, ctx))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product id")?;
    Ok(Json(state.products.get_one(&ctx, product_id).await?.into()))
}

/// GET /api/products?name=&priceMin=&priceMax=&page=&size=&sort=
#[tracing::instrument(skip(state, ctx, params))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    params: ListParams,
) -> Result<Json<Page<ProductResponse>>, ApiError> {
    let filter = ProductFilter {
        name: params.text("name"),
        price_min: params.parse("priceMin")?,
        price_max: params.parse("priceMax")?,
    };
    let page = params.page_request(&state.config)?;
    let result = state.products.find_all(&ctx, filter, page).await?;
    Ok(Json(result.map(Into::into)))
}

#[tracing::instrument(skip(state, ctx, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product id")?;
    let product = state
        .products
        .update(&ctx, product_id, req.try_into()?)
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /api/products/{id}: refused while any order item references it.
#[tracing::instrument(skip(state, ctx))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id: ProductId = parse_id(&id, "product id")?;
    state.products.delete(&ctx, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
