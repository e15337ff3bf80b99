//! Request handlers for the order and cart endpoints.
//!
//! Handlers stay thin: authentication runs in the extractor, business rules
//! live in the order service, and cart operations are simple validations
//! over the repositories.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::{CartItem, CartSummary, OrderStatus, OrderWithItems};
use crate::orders::{CheckoutRequest, UpdateOrderRequest};
use crate::repositories::{carts, products};

use super::pagination::{Paginated, PaginationParams};
use super::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// GET /api/ordenes
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<OrderWithItems>>, AppError> {
    let estado = match query.estado.as_deref() {
        Some(raw) => Some(
            OrderStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("Estado no válido: {raw}")))?,
        ),
        None => None,
    };
    let page = query.pagination.normalize();
    let (data, total) = state
        .orders
        .list(&user, estado, query.user_id, page.limit, page.offset())
        .await?;
    Ok(Json(Paginated::new(data, total, &page)))
}

/// POST /api/ordenes
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let orden = state.orders.checkout(&user, request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "orden": orden }))))
}

/// GET /api/ordenes/{id} — by id or numero_orden.
pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(reference): Path<String>,
) -> Result<Json<OrderWithItems>, AppError> {
    let orden = state.orders.get(&user, &reference).await?;
    Ok(Json(orden))
}

/// PUT /api/ordenes/{id}
pub async fn update_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(reference): Path<String>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<OrderWithItems>, AppError> {
    let orden = state.orders.update(&user, &reference, request).await?;
    Ok(Json(orden))
}

/// GET /api/carrito
pub async fn get_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<CartSummary>, AppError> {
    let (carrito_id, updated_at) = carts::ensure_cart(&state.pool, user.id).await?;
    let lines = carts::lines_for_user(&state.pool, user.id).await?;

    let items: Vec<CartItem> = lines
        .into_iter()
        .filter(|line| line.activo)
        .map(|line| CartItem {
            id: line.item_id,
            carrito_id,
            producto_id: line.producto_id,
            cantidad: line.cantidad,
            producto: crate::models::CartProduct {
                id: line.producto_id,
                nombre: line.nombre,
                slug: line.slug,
                precio: line.precio,
                precio_oferta: line.precio_oferta,
                stock: line.stock,
                activo: line.activo,
            },
        })
        .collect();

    let subtotal = items
        .iter()
        .map(|item| item.producto.precio_vigente() * i64::from(item.cantidad))
        .sum();
    let total_items = items.iter().map(|item| item.cantidad).sum();

    Ok(Json(CartSummary {
        id: carrito_id,
        user_id: user.id,
        items,
        subtotal,
        total_items,
        updated_at,
    }))
}

/// DELETE /api/carrito
pub async fn clear_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    carts::clear_for_user(&state.pool, user.id).await?;
    Ok(Json(json!({ "message": "Carrito vaciado correctamente" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    #[serde(default)]
    pub producto_id: Option<Uuid>,
    #[serde(default = "default_cantidad")]
    pub cantidad: i32,
}

fn default_cantidad() -> i32 {
    1
}

/// POST /api/carrito/items — adds a product, merging quantities when the
/// product is already in the cart.
pub async fn add_cart_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let producto_id = request
        .producto_id
        .ok_or_else(|| AppError::Validation("El productoId es requerido".into()))?;
    if request.cantidad < 1 {
        return Err(AppError::Validation("La cantidad debe ser mayor a 0".into()));
    }

    let producto = products::find_cart_product(&state.pool, producto_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Producto no encontrado".into()))?;
    if !producto.activo {
        return Err(AppError::Validation("El producto no está disponible".into()));
    }
    if producto.stock < request.cantidad {
        return Err(AppError::Validation(format!(
            "Stock insuficiente. Disponible: {}",
            producto.stock
        )));
    }

    let (carrito_id, _) = carts::ensure_cart(&state.pool, user.id).await?;
    let existente = carts::find_item_quantity(&state.pool, carrito_id, producto_id).await?;

    let (status, cantidad_total) = match existente {
        Some((_, en_carrito)) => {
            let cantidad_total = en_carrito + request.cantidad;
            if producto.stock < cantidad_total {
                return Err(AppError::Validation(format!(
                    "Stock insuficiente. Disponible: {}, en carrito: {}",
                    producto.stock, en_carrito
                )));
            }
            (StatusCode::OK, cantidad_total)
        }
        None => (StatusCode::CREATED, request.cantidad),
    };

    let item_id = carts::set_item(&state.pool, carrito_id, producto_id, cantidad_total).await?;
    Ok((
        status,
        Json(json!({
            "id": item_id,
            "carritoId": carrito_id,
            "productoId": producto_id,
            "cantidad": cantidad_total,
            "producto": producto,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    #[serde(default)]
    pub cantidad: Option<i32>,
}

/// PUT /api/carrito/items/{id}
pub async fn update_cart_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Json<Value>, AppError> {
    let cantidad = request
        .cantidad
        .filter(|c| *c >= 1)
        .ok_or_else(|| AppError::Validation("La cantidad debe ser mayor a 0".into()))?;

    let item = carts::find_item(&state.pool, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Item no encontrado".into()))?;
    if item.user_id != user.id {
        return Err(AppError::Forbidden(
            "No tienes permiso para modificar este item".into(),
        ));
    }
    if item.stock < cantidad {
        return Err(AppError::Validation(format!(
            "Stock insuficiente. Disponible: {}",
            item.stock
        )));
    }

    carts::update_item_quantity(&state.pool, item_id, cantidad).await?;
    Ok(Json(json!({ "id": item_id, "cantidad": cantidad })))
}

/// DELETE /api/carrito/items/{id}
pub async fn remove_cart_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let item = carts::find_item(&state.pool, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Item no encontrado".into()))?;
    if item.user_id != user.id {
        return Err(AppError::Forbidden(
            "No tienes permiso para eliminar este item".into(),
        ));
    }
    carts::delete_item(&state.pool, item_id).await?;
    Ok(Json(json!({ "message": "Item eliminado del carrito" })))
}
