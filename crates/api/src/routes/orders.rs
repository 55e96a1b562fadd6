//! Order endpoints: creation, item changes, status and search.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ClientId, OrderId, Page, ProductId, RequestContext};
use domain::{AddProduct, CreateOrder, ItemRequest, OrderFilter, OrderItemView, OrderView};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{OrderStatus, Store};

use super::params::{ApiJson, ListParams, parse_id};
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub client_id: ClientId,
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

impl From<CreateOrderRequest> for CreateOrder {
    fn from(req: CreateOrderRequest) -> Self {
        let items = req
            .items
            .into_iter()
            .map(|i| ItemRequest::new(i.product_id, i.quantity))
            .collect();
        let cmd = CreateOrder::new(req.client_id, items);
        match req.status {
            Some(status) => cmd.with_status(status),
            None => cmd,
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub client_id: ClientId,
    pub items: Vec<OrderItemResponse>,
    pub items_total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<OrderItemView> for OrderItemResponse {
    fn from(item: OrderItemView) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name,
            quantity: item.quantity,
            price: item.price,
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(view: OrderView) -> Self {
        Self {
            id: view.id,
            created_at: view.created_at,
            status: view.status,
            client_id: view.client_id,
            items: view.items.into_iter().map(Into::into).collect(),
            items_total: view.items_total,
        }
    }
}

// -- Handlers --

/// POST /api/orders: creates an order with its initial items.
#[tracing::instrument(skip(state, ctx, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let view = state.orders.create(&ctx, req.into()).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// GET /api/orders/{id}
#[tracing::instrument(skip(state, ctx))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let view = state.orders.get_one(&ctx, order_id).await?;
    Ok(Json(view.into()))
}

/// GET /api/orders?status=&from=&to=&productId=&page=&size=&sort=
#[tracing::instrument(skip(state, ctx, params))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    params: ListParams,
) -> Result<Json<Page<OrderResponse>>, ApiError> {
    let filter = OrderFilter {
        status: params.parse("status")?,
        from: params.timestamp("from")?,
        to: params.timestamp("to")?,
        product_id: params.parse("productId")?,
    };
    let page = params.page_request(&state.config)?;
    let result = state.orders.find_all(&ctx, filter, page).await?;
    Ok(Json(result.map(Into::into)))
}

/// PATCH /api/orders/{id}/status?status=
#[tracing::instrument(skip(state, ctx, params))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    params: ListParams,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let status: OrderStatus = params
        .parse("status")?
        .ok_or_else(|| ApiError::BadRequest("Missing required parameter 'status'".to_string()))?;
    let view = state.orders.update_status(&ctx, order_id, status).await?;
    Ok(Json(view.into()))
}

/// DELETE /api/orders/{id}
#[tracing::instrument(skip(state, ctx))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    state.orders.delete(&ctx, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/orders/{id}: adds a product that is not yet on the order.
#[tracing::instrument(skip(state, ctx, req))]
pub async fn add_product<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<OrderItemRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let cmd = AddProduct::new(req.product_id, req.quantity);
    let view = state.orders.add_product(&ctx, order_id, cmd).await?;
    Ok(Json(view.into()))
}

/// PATCH /api/orders/{id}/items/{productId}
#[tracing::instrument(skip(state, ctx, req))]
pub async fn change_quantity<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, product)): Path<(String, String)>,
    ApiJson(req): ApiJson<QuantityRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let product_id: ProductId = parse_id(&product, "product id")?;
    let view = state
        .orders
        .change_quantity(&ctx, order_id, product_id, req.quantity)
        .await?;
    Ok(Json(view.into()))
}

/// DELETE /api/orders/{id}/items/{productId}
#[tracing::instrument(skip(state, ctx))]
pub async fn remove_product<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, product)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order id")?;
    let product_id: ProductId = parse_id(&product, "product id")?;
    let view = state
        .orders
        .remove_product(&ctx, order_id, product_id)
        .await?;
    Ok(Json(view.into()))
}
