//! Client endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use common::{ClientId, Page, RequestContext};
use domain::{ClientDraft, ClientFilter, ClientView};
use serde::{Deserialize, Serialize};
use store::Store;

use super::params::{ApiJson, ListParams, parse_id};
use crate::AppState;
use crate::error::ApiError;

/// Missing fields deserialize as blank and are rejected by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl From<ClientRequest> for ClientDraft {
    fn from(req: ClientRequest) -> Self {
        ClientDraft {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub orders_count: u64,
}

impl From<ClientView> for ClientResponse {
    fn from(view: ClientView) -> Self {
        Self {
            id: view.id,
            first_name: view.first_name,
            last_name: view.last_name,
            email: view.email,
            phone: view.phone,
            orders_count: view.orders_count,
        }
    }
}

#[tracing::instrument(skip(state, ctx, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    ApiJson(req): ApiJson<ClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>), ApiError> {
    let view = state.clients.create(&ctx, req.into()).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

#[tracing::instrument(skip(state, ctx))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let client_id: ClientId = parse_id(&id, "client id")?;
    Ok(Json(state.clients.get_one(&ctx, client_id).await?.into()))
}

/// GET /api/clients?firstName=&lastName=&email=&phone=&page=&size=&sort=
#[tracing::instrument(skip(state, ctx, params))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    params: ListParams,
) -> Result<Json<Page<ClientResponse>>, ApiError> {
    let filter = ClientFilter {
        first_name: params.text("firstName"),
        last_name: params.text("lastName"),
        email: params.text("email"),
        phone: params.text("phone"),
    };
    let page = params.page_request(&state.config)?;
    let result = state.clients.find_all(&ctx, filter, page).await?;
    Ok(Json(result.map(Into::into)))
}

#[tracing::instrument(skip(state, ctx, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ClientRequest>,
) -> Result<Json<ClientResponse>, ApiError> {
    let client_id: ClientId = parse_id(&id, "client id")?;
    let view = state.clients.update(&ctx, client_id, req.into()).await?;
    Ok(Json(view.into()))
}

/// DELETE /api/clients/{id}: refused while the client still has orders.
#[tracing::instrument(skip(state, ctx))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let client_id: ClientId = parse_id(&id, "client id")?;
    state.clients.delete(&ctx, client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
