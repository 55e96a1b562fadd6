//! HTTP API server for the order management system.
//!
//! Provides REST endpoints for orders, clients and products, with
//! request correlation, structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::routing::{get, patch, post};
use common::RequestContext;
use domain::{ClientService, OrderService, ProductService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub orders: OrderService<S>,
    pub clients: ClientService<S>,
    pub products: ProductService<S>,
    pub config: Config,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            clients: ClientService::new(store.clone()),
            products: ProductService::new(store.clone()),
            store,
            config,
        }
    }
}

/// Creates the default application state around a store.
pub fn create_state<S: Store + Clone + 'static>(store: S, config: Config) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, config))
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{clients, orders, products, system};

    let metrics_router = Router::new()
        .route("/metrics", get(system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(system::health::<S>))
        .route("/api/orders", post(orders::create::<S>).get(orders::list::<S>))
        .route(
            "/api/orders/{id}",
            get(orders::get::<S>)
                .post(orders::add_product::<S>)
                .delete(orders::delete::<S>),
        )
        .route("/api/orders/{id}/status", patch(orders::update_status::<S>))
        .route(
            "/api/orders/{id}/items/{product_id}",
            patch(orders::change_quantity::<S>).delete(orders::remove_product::<S>),
        )
        .route(
            "/api/clients",
            post(clients::create::<S>).get(clients::list::<S>),
        )
        .route(
            "/api/clients/{id}",
            get(clients::get::<S>)
                .put(clients::update::<S>)
                .delete(clients::delete::<S>),
        )
        .route(
            "/api/products",
            post(products::create::<S>).get(products::list::<S>),
        )
        .route(
            "/api/products/{id}",
            get(products::get::<S>)
                .put(products::update::<S>)
                .delete(products::delete::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .extensions()
                .get::<RequestContext>()
                .map(|ctx| ctx.request_id.to_string())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }))
        .layer(axum::middleware::from_fn(middleware::request_context))
}
