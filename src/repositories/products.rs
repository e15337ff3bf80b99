use std::sync::Arc;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::executor::Executor;
use crate::models::CartProduct;
use crate::transaction_aware::TransactionResult;

/// What the order transaction needs to know about a product after a refused
/// stock decrement.
#[derive(Debug, Clone)]
pub struct ProductAvailability {
    pub nombre: String,
    pub stock: i32,
    pub activo: bool,
}

/// Stock mutations for the order workflow, bound to a session's transaction.
///
/// The conditional decrement is the storage-level guarantee that stock never
/// goes negative: the pre-transaction checks only exist to fail early with a
/// friendly message.
pub struct ProductRepository {
    executor: Executor,
}

impl ProductRepository {
    pub fn new(executor: Executor) -> Arc<Self> {
        Arc::new(Self { executor })
    }

    /// Decrements stock only when the product is active and has enough
    /// units. Returns `false` when the row was not touched.
    pub async fn try_decrement_stock(
        &self,
        producto_id: Uuid,
        cantidad: i32,
    ) -> TransactionResult<bool> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        let result = sqlx::query(
            "UPDATE productos SET stock = stock - $2, updated_at = now() \
             WHERE id = $1 AND activo AND stock >= $2",
        )
        .bind(producto_id)
        .bind(cantidad)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns `cantidad` units to stock (cancellation path).
    pub async fn restore_stock(&self, producto_id: Uuid, cantidad: i32) -> TransactionResult<()> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        sqlx::query("UPDATE productos SET stock = stock + $2, updated_at = now() WHERE id = $1")
            .bind(producto_id)
            .bind(cantidad)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Reads name/stock/active inside the transaction, to name the precise
    /// reason a decrement was refused.
    pub async fn availability(
        &self,
        producto_id: Uuid,
    ) -> TransactionResult<Option<ProductAvailability>> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        let row = sqlx::query("SELECT nombre, stock, activo FROM productos WHERE id = $1")
            .bind(producto_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(|r| ProductAvailability {
            nombre: r.get("nombre"),
            stock: r.get("stock"),
            activo: r.get("activo"),
        }))
    }
}

/// Live product row for cart validation and cart responses.
pub async fn find_cart_product(pool: &PgPool, id: Uuid) -> Result<Option<CartProduct>, AppError> {
    let row = sqlx::query(
        "SELECT id, nombre, slug, precio, precio_oferta, stock, activo FROM productos WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| CartProduct {
        id: r.get("id"),
        nombre: r.get("nombre"),
        slug: r.get("slug"),
        precio: r.get("precio"),
        precio_oferta: r.get("precio_oferta"),
        stock: r.get("stock"),
        activo: r.get("activo"),
    }))
}
