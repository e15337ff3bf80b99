use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::transaction_aware::{TransactionAware, TransactionResult};

/// One cart line joined with live product data; checkout drafts are computed
/// from these.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item_id: Uuid,
    pub producto_id: Uuid,
    pub nombre: String,
    pub slug: String,
    pub precio: i64,
    pub precio_oferta: Option<i64>,
    pub stock: i32,
    pub activo: bool,
    pub cantidad: i32,
}

impl CartLine {
    pub fn precio_vigente(&self) -> i64 {
        self.precio_oferta.unwrap_or(self.precio)
    }
}

/// Returns the user's cart id (and its timestamp), creating the cart on
/// first use.
pub async fn ensure_cart(pool: &PgPool, user_id: Uuid) -> Result<(Uuid, DateTime<Utc>), AppError> {
    sqlx::query(
        "INSERT INTO carritos (id, user_id, updated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT id, updated_at FROM carritos WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok((row.get("id"), row.get("updated_at")))
}

/// All of the user's cart lines with their product data, newest first.
pub async fn lines_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<CartLine>, AppError> {
    let rows = sqlx::query(
        "SELECT ci.id AS item_id, p.id AS producto_id, p.nombre, p.slug, p.precio, \
                p.precio_oferta, p.stock, p.activo, ci.cantidad \
         FROM carrito_items ci \
         JOIN carritos c ON c.id = ci.carrito_id \
         JOIN productos p ON p.id = ci.producto_id \
         WHERE c.user_id = $1 \
         ORDER BY ci.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| CartLine {
            item_id: r.get("item_id"),
            producto_id: r.get("producto_id"),
            nombre: r.get("nombre"),
            slug: r.get("slug"),
            precio: r.get("precio"),
            precio_oferta: r.get("precio_oferta"),
            stock: r.get("stock"),
            activo: r.get("activo"),
            cantidad: r.get("cantidad"),
        })
        .collect())
}

/// Existing quantity of a product in a cart, if any.
pub async fn find_item_quantity(
    pool: &PgPool,
    carrito_id: Uuid,
    producto_id: Uuid,
) -> Result<Option<(Uuid, i32)>, AppError> {
    let row = sqlx::query(
        "SELECT id, cantidad FROM carrito_items WHERE carrito_id = $1 AND producto_id = $2",
    )
    .bind(carrito_id)
    .bind(producto_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| (r.get("id"), r.get("cantidad"))))
}

/// Sets a cart line to an absolute quantity, inserting it if missing.
pub async fn set_item(
    pool: &PgPool,
    carrito_id: Uuid,
    producto_id: Uuid,
    cantidad: i32,
) -> Result<Uuid, AppError> {
    let row = sqlx::query(
        "INSERT INTO carrito_items (id, carrito_id, producto_id, cantidad) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (carrito_id, producto_id) DO UPDATE SET cantidad = EXCLUDED.cantidad \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(carrito_id)
    .bind(producto_id)
    .bind(cantidad)
    .fetch_one(pool)
    .await?;
    Ok(row.get("id"))
}

/// A cart item with enough context for ownership and stock checks.
#[derive(Debug, Clone)]
pub struct CartItemOwner {
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub producto_id: Uuid,
    pub stock: i32,
}

pub async fn find_item(pool: &PgPool, item_id: Uuid) -> Result<Option<CartItemOwner>, AppError> {
    let row = sqlx::query(
        "SELECT ci.id AS item_id, c.user_id, ci.producto_id, p.stock \
         FROM carrito_items ci \
         JOIN carritos c ON c.id = ci.carrito_id \
         JOIN productos p ON p.id = ci.producto_id \
         WHERE ci.id = $1",
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| CartItemOwner {
        item_id: r.get("item_id"),
        user_id: r.get("user_id"),
        producto_id: r.get("producto_id"),
        stock: r.get("stock"),
    }))
}

pub async fn update_item_quantity(
    pool: &PgPool,
    item_id: Uuid,
    cantidad: i32,
) -> Result<(), AppError> {
    sqlx::query("UPDATE carrito_items SET cantidad = $2 WHERE id = $1")
        .bind(item_id)
        .bind(cantidad)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_item(pool: &PgPool, item_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM carrito_items WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Empties the user's cart. Returns the number of removed lines.
pub async fn clear_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        "DELETE FROM carrito_items ci USING carritos c \
         WHERE ci.carrito_id = c.id AND c.user_id = $1",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Clears the buyer's cart once the checkout transaction has committed.
///
/// Registered on the unit-of-work session so a rolled-back checkout leaves
/// the cart intact for the buyer to retry.
pub struct CartReset {
    pool: Arc<PgPool>,
    user_id: Uuid,
}

impl CartReset {
    pub fn new(pool: Arc<PgPool>, user_id: Uuid) -> Arc<Self> {
        Arc::new(Self { pool, user_id })
    }
}

#[async_trait]
impl TransactionAware for CartReset {
    async fn on_commit(&self) -> TransactionResult<()> {
        sqlx::query(
            "DELETE FROM carrito_items ci USING carritos c \
             WHERE ci.carrito_id = c.id AND c.user_id = $1",
        )
        .bind(self.user_id)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn on_rollback(&self) -> TransactionResult<()> {
        Ok(())
    }
}
