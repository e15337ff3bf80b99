//! The order workflow: checkout from the server-side cart, and the status
//! lifecycle for manual payment verification.
//!
//! The persisted cart is the single source of truth for a checkout: the
//! client sends shipping data and the payment proof, never prices or
//! quantities. Order, line items and stock decrements commit together in one
//! unit-of-work session; cancellation restores stock inside its own session.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AuthUser, Order, OrderStatus, OrderWithItems, PaymentMethod};
use crate::order_number::generate_order_number;
use crate::repositories::carts::{self, CartLine, CartReset};
use crate::repositories::orders::{self as orders_repo, NewOrder, NewOrderItem, OrderFilter, OrderRepository};
use crate::repositories::products::ProductRepository;
use crate::unit_of_work::{PostgresUnitOfWork, PostgresUnitOfWorkSession, UnitOfWork, UnitOfWorkSession};

/// Shipping data sent by the storefront at checkout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[serde(default)]
    pub direccion: String,
    #[serde(default)]
    pub ciudad: String,
    #[serde(default)]
    pub referencia: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
}

/// Checkout payload. Everything about the goods comes from the cart.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub datos_envio: Option<ShippingDetails>,
    #[serde(default)]
    pub comprobante_pago: Option<String>,
    #[serde(default)]
    pub metodo_pago: Option<PaymentMethod>,
    #[serde(default)]
    pub notas: Option<String>,
}

/// Order mutation payload: customers attach the proof, admins move the
/// status.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub comprobante_pago: Option<String>,
}

/// A validated, fully priced checkout ready to persist.
#[derive(Debug)]
pub struct CheckoutDraft {
    pub orden: NewOrder,
    pub items: Vec<NewOrderItem>,
}

/// Validates the cart and the request, snapshots names/prices and computes
/// totals. Pure: the transaction revalidates stock with conditional updates,
/// this only fails early with a friendly message.
pub fn build_checkout_draft(
    user_id: Uuid,
    lines: &[CartLine],
    request: &CheckoutRequest,
    envio: i64,
) -> Result<CheckoutDraft, AppError> {
    if lines.is_empty() {
        return Err(AppError::Validation("El carrito está vacío".into()));
    }

    let datos = request
        .datos_envio
        .as_ref()
        .filter(|d| !d.direccion.trim().is_empty() && !d.ciudad.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Datos de envío incompletos".into()))?;

    let comprobante = request
        .comprobante_pago
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Comprobante de pago requerido".into()))?;

    let mut items = Vec::with_capacity(lines.len());
    let mut subtotal = 0_i64;
    for line in lines {
        if !line.activo {
            return Err(AppError::Validation(format!(
                "Producto no disponible: {}",
                line.nombre
            )));
        }
        if line.stock < line.cantidad {
            return Err(AppError::InsufficientStock {
                nombre: line.nombre.clone(),
                disponible: line.stock,
            });
        }
        let precio_unitario = line.precio_vigente();
        let subtotal_linea = precio_unitario * i64::from(line.cantidad);
        subtotal += subtotal_linea;
        items.push(NewOrderItem {
            producto_id: line.producto_id,
            nombre_producto: line.nombre.clone(),
            cantidad: line.cantidad,
            precio_unitario,
            subtotal: subtotal_linea,
        });
    }

    let direccion = datos.direccion.trim();
    let ciudad = datos.ciudad.trim();
    let direccion_envio = match datos
        .referencia
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    {
        Some(referencia) => format!("{direccion}, {ciudad} (Ref: {referencia})"),
        None => format!("{direccion}, {ciudad}"),
    };

    let orden = NewOrder {
        id: Uuid::new_v4(),
        numero_orden: generate_order_number(),
        user_id,
        estado: OrderStatus::Verificando,
        subtotal,
        envio,
        total: subtotal + envio,
        metodo_pago: request.metodo_pago.unwrap_or_default(),
        comprobante_pago: comprobante.to_string(),
        direccion_envio,
        telefono_contacto: datos
            .telefono
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        notas: request.notas.clone(),
    };

    Ok(CheckoutDraft { orden, items })
}

/// Coordinates the order workflow over the shared pool and the unit of work.
#[derive(Clone)]
pub struct OrderService {
    pool: Arc<PgPool>,
    uow: Arc<PostgresUnitOfWork>,
    envio: i64,
}

impl OrderService {
    pub fn new(pool: Arc<PgPool>, envio: i64) -> Self {
        let uow = Arc::new(PostgresUnitOfWork::new(pool.clone()));
        Self { pool, uow, envio }
    }

    /// Creates an order from the buyer's persisted cart.
    ///
    /// The order row, its items and every stock decrement commit or roll
    /// back together; the cart is emptied only after the commit.
    #[instrument(skip(self, request), fields(user_id = %user.id))]
    pub async fn checkout(
        &self,
        user: &AuthUser,
        request: CheckoutRequest,
    ) -> Result<OrderWithItems, AppError> {
        let lines = carts::lines_for_user(&self.pool, user.id).await?;
        let draft = build_checkout_draft(user.id, &lines, &request, self.envio)?;

        let session = self.uow.begin().await?;
        session.register_transaction_aware(CartReset::new(self.pool.clone(), user.id));

        match Self::persist_checkout(&session, &draft).await {
            Ok(()) => session.commit().await?,
            Err(err) => {
                session.rollback().await?;
                return Err(err);
            }
        }

        info!(
            numero_orden = %draft.orden.numero_orden,
            total = draft.orden.total,
            "orden creada"
        );
        self.reload(draft.orden.id).await
    }

    async fn persist_checkout(
        session: &PostgresUnitOfWorkSession,
        draft: &CheckoutDraft,
    ) -> Result<(), AppError> {
        let order_repo = OrderRepository::new(session.executor().clone());
        let product_repo = ProductRepository::new(session.executor().clone());

        order_repo.insert(&draft.orden).await?;
        for item in &draft.items {
            order_repo.insert_item(draft.orden.id, item).await?;
            if !product_repo
                .try_decrement_stock(item.producto_id, item.cantidad)
                .await?
            {
                // decrement refused: re-read the row to name the exact cause
                return Err(match product_repo.availability(item.producto_id).await? {
                    Some(p) if p.activo => AppError::InsufficientStock {
                        nombre: p.nombre,
                        disponible: p.stock,
                    },
                    _ => AppError::Validation(format!(
                        "Producto no disponible: {}",
                        item.nombre_producto
                    )),
                });
            }
        }
        Ok(())
    }

    /// Order by id or numero_orden. Customers may only see their own.
    pub async fn get(&self, user: &AuthUser, reference: &str) -> Result<OrderWithItems, AppError> {
        let (orden, cliente) = orders_repo::find_with_customer(&self.pool, reference)
            .await?
            .ok_or_else(|| AppError::NotFound("Orden no encontrada".into()))?;
        if !user.is_admin() && orden.user_id != user.id {
            return Err(AppError::Forbidden(
                "No tienes permiso para ver esta orden".into(),
            ));
        }
        self.assemble(orden, cliente).await
    }

    /// One listing page. Customers are hard-scoped to their own orders;
    /// admins may filter by buyer.
    pub async fn list(
        &self,
        user: &AuthUser,
        estado: Option<OrderStatus>,
        user_filter: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderWithItems>, i64), AppError> {
        let filter = OrderFilter {
            user_id: if user.is_admin() {
                user_filter
            } else {
                Some(user.id)
            },
            estado,
        };
        let total = orders_repo::count(&self.pool, &filter).await?;
        let rows = orders_repo::list_with_customer(&self.pool, &filter, limit, offset).await?;

        let ids: Vec<Uuid> = rows.iter().map(|(orden, _)| orden.id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<_>> = HashMap::new();
        for item in orders_repo::items_for(&self.pool, &ids).await? {
            items_by_order.entry(item.orden_id).or_default().push(item);
        }

        let data = rows
            .into_iter()
            .map(|(orden, cliente)| {
                let items = items_by_order.remove(&orden.id).unwrap_or_default();
                OrderWithItems {
                    items,
                    user: Some(cliente),
                    orden,
                }
            })
            .collect();
        Ok((data, total))
    }

    /// Customer: attach the payment proof to an own PENDIENTE order.
    /// Admin: move the order through the state machine; cancelling returns
    /// every item's quantity to stock inside the same transaction.
    #[instrument(skip(self, request), fields(user_id = %user.id, reference = %reference))]
    pub async fn update(
        &self,
        user: &AuthUser,
        reference: &str,
        request: UpdateOrderRequest,
    ) -> Result<OrderWithItems, AppError> {
        let (orden, _) = orders_repo::find_with_customer(&self.pool, reference)
            .await?
            .ok_or_else(|| AppError::NotFound("Orden no encontrada".into()))?;

        if user.is_admin() {
            self.admin_update(orden, request).await
        } else {
            self.attach_comprobante(user, orden, request).await
        }
    }

    async fn attach_comprobante(
        &self,
        user: &AuthUser,
        orden: Order,
        request: UpdateOrderRequest,
    ) -> Result<OrderWithItems, AppError> {
        if orden.user_id != user.id {
            return Err(AppError::Forbidden(
                "No tienes permiso para modificar esta orden".into(),
            ));
        }
        let comprobante = request
            .comprobante_pago
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        match comprobante {
            Some(comprobante) if orden.estado == OrderStatus::Pendiente => {
                orders_repo::update_order(
                    &self.pool,
                    orden.id,
                    Some(OrderStatus::Verificando),
                    Some(comprobante),
                )
                .await?;
                info!(orden_id = %orden.id, "comprobante adjuntado, orden en verificación");
                self.reload(orden.id).await
            }
            _ => Err(AppError::Validation(
                "No puedes modificar esta orden".into(),
            )),
        }
    }

    async fn admin_update(
        &self,
        orden: Order,
        request: UpdateOrderRequest,
    ) -> Result<OrderWithItems, AppError> {
        let comprobante = request
            .comprobante_pago
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let destino = match request.estado.as_deref() {
            Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "Estado no válido: {raw}. Valores permitidos: {}",
                    OrderStatus::ALL.map(OrderStatus::as_str).join(", ")
                ))
            })?),
            None => None,
        };

        match destino {
            Some(destino) => {
                if !orden.estado.can_transition_to(destino) {
                    return Err(AppError::Conflict(format!(
                        "Una orden en estado {} no admite más cambios",
                        orden.estado
                    )));
                }
                if orden.estado.restores_stock_on(destino) {
                    self.cancel_and_restock(orden.id, comprobante).await?;
                    info!(orden_id = %orden.id, "orden cancelada, stock restaurado");
                } else if destino != orden.estado || comprobante.is_some() {
                    orders_repo::update_order(&self.pool, orden.id, Some(destino), comprobante)
                        .await?;
                    info!(orden_id = %orden.id, estado = %destino, "estado actualizado");
                }
            }
            None if comprobante.is_some() => {
                orders_repo::update_order(&self.pool, orden.id, None, comprobante).await?;
            }
            None => {}
        }
        self.reload(orden.id).await
    }

    async fn cancel_and_restock(
        &self,
        orden_id: Uuid,
        comprobante: Option<&str>,
    ) -> Result<(), AppError> {
        let session = self.uow.begin().await?;
        match Self::persist_cancellation(&session, orden_id, comprobante).await {
            Ok(()) => {
                session.commit().await?;
                Ok(())
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn persist_cancellation(
        session: &PostgresUnitOfWorkSession,
        orden_id: Uuid,
        comprobante: Option<&str>,
    ) -> Result<(), AppError> {
        let order_repo = OrderRepository::new(session.executor().clone());
        let product_repo = ProductRepository::new(session.executor().clone());

        let items = order_repo.items(orden_id).await?;
        for item in &items {
            product_repo
                .restore_stock(item.producto_id, item.cantidad)
                .await?;
        }
        order_repo
            .set_estado(orden_id, OrderStatus::Cancelado, comprobante)
            .await?;
        Ok(())
    }

    async fn reload(&self, orden_id: Uuid) -> Result<OrderWithItems, AppError> {
        let (orden, cliente) = orders_repo::find_with_customer(&self.pool, &orden_id.to_string())
            .await?
            .ok_or_else(|| AppError::NotFound("Orden no encontrada".into()))?;
        self.assemble(orden, cliente).await
    }

    async fn assemble(
        &self,
        orden: Order,
        cliente: crate::models::CustomerSummary,
    ) -> Result<OrderWithItems, AppError> {
        let items = orders_repo::items_for(&self.pool, &[orden.id]).await?;
        Ok(OrderWithItems {
            items,
            user: Some(cliente),
            orden,
        })
    }
}
