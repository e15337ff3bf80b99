//! HTTP surface: shared state and routing.

pub mod handlers;
pub mod pagination;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use sqlx::PgPool;

use crate::config::Config;
use crate::orders::OrderService;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PgPool>,
    pub config: Arc<Config>,
    pub orders: OrderService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let pool = Arc::new(pool);
        let orders = OrderService::new(pool.clone(), config.envio);
        Self {
            pool,
            config: Arc::new(config),
            orders,
        }
    }
}

/// All routes of the public API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/ordenes",
            get(handlers::list_orders).post(handlers::create_order),
        )
        .route(
            "/api/ordenes/{id}",
            get(handlers::get_order).put(handlers::update_order),
        )
        .route(
            "/api/carrito",
            get(handlers::get_cart).delete(handlers::clear_cart),
        )
        .route("/api/carrito/items", post(handlers::add_cart_item))
        .route(
            "/api/carrito/items/{id}",
            put(handlers::update_cart_item).delete(handlers::remove_cart_item),
        )
        .with_state(state)
}
