use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::executor::Executor;
use crate::models::{CustomerSummary, Order, OrderItem, OrderStatus, PaymentMethod};
use crate::transaction_aware::TransactionResult;

use super::decode_err;

/// Order header ready to persist. Snapshots and totals were computed by the
/// checkout draft; this layer only writes them.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub numero_orden: String,
    pub user_id: Uuid,
    pub estado: OrderStatus,
    pub subtotal: i64,
    pub envio: i64,
    pub total: i64,
    pub metodo_pago: PaymentMethod,
    pub comprobante_pago: String,
    pub direccion_envio: String,
    pub telefono_contacto: Option<String>,
    pub notas: Option<String>,
}

/// One line to persist, with its purchase-time snapshots.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub producto_id: Uuid,
    pub nombre_producto: String,
    pub cantidad: i32,
    pub precio_unitario: i64,
    pub subtotal: i64,
}

/// Filters for order listings. `user_id` is mandatory scoping for
/// customers; admins may leave it empty or pick a buyer.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub estado: Option<OrderStatus>,
}

/// Order persistence bound to a unit-of-work session.
pub struct OrderRepository {
    executor: Executor,
}

impl OrderRepository {
    pub fn new(executor: Executor) -> Arc<Self> {
        Arc::new(Self { executor })
    }

    pub async fn insert(&self, orden: &NewOrder) -> TransactionResult<()> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        sqlx::query(
            "INSERT INTO ordenes (id, numero_orden, user_id, estado, subtotal, envio, total, \
                                  metodo_pago, comprobante_pago, direccion_envio, \
                                  telefono_contacto, notas) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(orden.id)
        .bind(&orden.numero_orden)
        .bind(orden.user_id)
        .bind(orden.estado.as_str())
        .bind(orden.subtotal)
        .bind(orden.envio)
        .bind(orden.total)
        .bind(orden.metodo_pago.as_str())
        .bind(&orden.comprobante_pago)
        .bind(&orden.direccion_envio)
        .bind(orden.telefono_contacto.as_deref())
        .bind(orden.notas.as_deref())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn insert_item(&self, orden_id: Uuid, item: &NewOrderItem) -> TransactionResult<()> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        sqlx::query(
            "INSERT INTO orden_items (id, orden_id, producto_id, nombre_producto, cantidad, \
                                      precio_unitario, subtotal) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(orden_id)
        .bind(item.producto_id)
        .bind(&item.nombre_producto)
        .bind(item.cantidad)
        .bind(item.precio_unitario)
        .bind(item.subtotal)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Status change inside the transaction (cancellation path), optionally
    /// replacing the payment proof in the same statement.
    pub async fn set_estado(
        &self,
        orden_id: Uuid,
        estado: OrderStatus,
        comprobante_pago: Option<&str>,
    ) -> TransactionResult<()> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        sqlx::query(
            "UPDATE ordenes SET estado = $2, \
                                comprobante_pago = COALESCE($3, comprobante_pago), \
                                updated_at = now() \
             WHERE id = $1",
        )
        .bind(orden_id)
        .bind(estado.as_str())
        .bind(comprobante_pago)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Line items read inside the transaction, for the restock loop.
    pub async fn items(&self, orden_id: Uuid) -> TransactionResult<Vec<OrderItem>> {
        let mut tx_guard = self.executor.tx.lock().await;
        let tx = tx_guard.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        let rows = sqlx::query(
            "SELECT id, orden_id, producto_id, nombre_producto, cantidad, precio_unitario, subtotal \
             FROM orden_items WHERE orden_id = $1",
        )
        .bind(orden_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }
}

fn item_from_row(row: &PgRow) -> OrderItem {
    OrderItem {
        id: row.get("id"),
        orden_id: row.get("orden_id"),
        producto_id: row.get("producto_id"),
        nombre_producto: row.get("nombre_producto"),
        cantidad: row.get("cantidad"),
        precio_unitario: row.get("precio_unitario"),
        subtotal: row.get("subtotal"),
    }
}

fn order_from_row(row: &PgRow) -> Result<(Order, CustomerSummary), sqlx::Error> {
    let estado: String = row.get("estado");
    let metodo_pago: String = row.get("metodo_pago");
    let orden = Order {
        id: row.get("id"),
        numero_orden: row.get("numero_orden"),
        user_id: row.get("user_id"),
        estado: OrderStatus::parse(&estado)
            .ok_or_else(|| decode_err(format!("unknown estado in ordenes row: {estado}")))?,
        subtotal: row.get("subtotal"),
        envio: row.get("envio"),
        total: row.get("total"),
        metodo_pago: PaymentMethod::parse(&metodo_pago)
            .ok_or_else(|| decode_err(format!("unknown metodo_pago in ordenes row: {metodo_pago}")))?,
        comprobante_pago: row.get("comprobante_pago"),
        direccion_envio: row.get("direccion_envio"),
        telefono_contacto: row.get("telefono_contacto"),
        notas: row.get("notas"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    };
    let cliente = CustomerSummary {
        id: row.get("cliente_id"),
        nombre: row.get("cliente_nombre"),
        apellido: row.get("cliente_apellido"),
        email: row.get("cliente_email"),
    };
    Ok((orden, cliente))
}

const ORDER_COLUMNS: &str = "o.id, o.numero_orden, o.user_id, o.estado, o.subtotal, o.envio, \
                             o.total, o.metodo_pago, o.comprobante_pago, o.direccion_envio, \
                             o.telefono_contacto, o.notas, o.created_at, o.updated_at, \
                             u.id AS cliente_id, u.nombre AS cliente_nombre, \
                             u.apellido AS cliente_apellido, u.email AS cliente_email";

/// Finds an order by id or by numero_orden, joined with its buyer.
pub async fn find_with_customer(
    pool: &PgPool,
    reference: &str,
) -> Result<Option<(Order, CustomerSummary)>, AppError> {
    let row = match Uuid::parse_str(reference) {
        Ok(id) => {
            sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM ordenes o JOIN users u ON u.id = o.user_id \
                 WHERE o.id = $1 OR o.numero_orden = $2"
            ))
            .bind(id)
            .bind(reference)
            .fetch_optional(pool)
            .await?
        }
        Err(_) => {
            sqlx::query(&format!(
                "SELECT {ORDER_COLUMNS} FROM ordenes o JOIN users u ON u.id = o.user_id \
                 WHERE o.numero_orden = $1"
            ))
            .bind(reference)
            .fetch_optional(pool)
            .await?
        }
    };
    row.map(|r| order_from_row(&r)).transpose().map_err(AppError::from)
}

/// One listing page, newest orders first.
pub async fn list_with_customer(
    pool: &PgPool,
    filter: &OrderFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<(Order, CustomerSummary)>, AppError> {
    let mut qb = QueryBuilder::<sqlx::Postgres>::new(format!(
        "SELECT {ORDER_COLUMNS} FROM ordenes o JOIN users u ON u.id = o.user_id WHERE TRUE"
    ));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY o.created_at DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter()
        .map(order_from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
}

pub async fn count(pool: &PgPool, filter: &OrderFilter) -> Result<i64, AppError> {
    let mut qb = QueryBuilder::<sqlx::Postgres>::new("SELECT COUNT(*) FROM ordenes o WHERE TRUE");
    push_filter(&mut qb, filter);
    let row = qb.build().fetch_one(pool).await?;
    Ok(row.get(0))
}

fn push_filter(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &OrderFilter) {
    if let Some(user_id) = filter.user_id {
        qb.push(" AND o.user_id = ");
        qb.push_bind(user_id);
    }
    if let Some(estado) = filter.estado {
        qb.push(" AND o.estado = ");
        qb.push_bind(estado.as_str());
    }
}

/// Items of several orders in one round trip; the caller groups them.
pub async fn items_for(pool: &PgPool, orden_ids: &[Uuid]) -> Result<Vec<OrderItem>, AppError> {
    if orden_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(
        "SELECT id, orden_id, producto_id, nombre_producto, cantidad, precio_unitario, subtotal \
         FROM orden_items WHERE orden_id = ANY($1) ORDER BY nombre_producto",
    )
    .bind(orden_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(item_from_row).collect())
}

/// Plain (non-restocking) update: status and/or payment proof.
pub async fn update_order(
    pool: &PgPool,
    orden_id: Uuid,
    estado: Option<OrderStatus>,
    comprobante_pago: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE ordenes SET estado = COALESCE($2, estado), \
                            comprobante_pago = COALESCE($3, comprobante_pago), \
                            updated_at = now() \
         WHERE id = $1",
    )
    .bind(orden_id)
    .bind(estado.map(OrderStatus::as_str))
    .bind(comprobante_pago)
    .execute(pool)
    .await?;
    Ok(())
}
