//! Domain types: catalog products, the server-side cart, orders with their
//! immutable line items, and the order status state machine.
//!
//! Wire JSON keeps the storefront's camelCase Spanish contract
//! (`numeroOrden`, `comprobantePago`, ...); money is `i64` centavos.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User roles. Admins run the back office; everyone else is a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Customer => "CUSTOMER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Role::Admin),
            "CUSTOMER" => Some(Role::Customer),
            _ => None,
        }
    }
}

/// Out-of-band payment channels; all of them verified manually by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Qr,
    Transferencia,
    Efectivo,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Qr
    }
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Qr => "QR",
            PaymentMethod::Transferencia => "TRANSFERENCIA",
            PaymentMethod::Efectivo => "EFECTIVO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "QR" => Some(PaymentMethod::Qr),
            "TRANSFERENCIA" => Some(PaymentMethod::Transferencia),
            "EFECTIVO" => Some(PaymentMethod::Efectivo),
            _ => None,
        }
    }
}

/// Lifecycle of an order.
///
/// The happy path is PENDIENTE → VERIFICANDO → PAGADO → PROCESANDO →
/// ENVIADO → ENTREGADO; CANCELADO is reachable from any non-terminal state.
/// All transition rules live here, not in the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pendiente,
    Verificando,
    Pagado,
    Procesando,
    Enviado,
    Entregado,
    Cancelado,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pendiente,
        OrderStatus::Verificando,
        OrderStatus::Pagado,
        OrderStatus::Procesando,
        OrderStatus::Enviado,
        OrderStatus::Entregado,
        OrderStatus::Cancelado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pendiente => "PENDIENTE",
            OrderStatus::Verificando => "VERIFICANDO",
            OrderStatus::Pagado => "PAGADO",
            OrderStatus::Procesando => "PROCESANDO",
            OrderStatus::Enviado => "ENVIADO",
            OrderStatus::Entregado => "ENTREGADO",
            OrderStatus::Cancelado => "CANCELADO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|estado| estado.as_str() == value)
    }

    /// Terminal states admit no further state changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Entregado | OrderStatus::Cancelado)
    }

    /// Whether an admin may move an order from `self` to `next`.
    /// Re-asserting the current state is always accepted as a no-op.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self == next || !self.is_terminal()
    }

    /// A transition into CANCELADO returns every line item's quantity to
    /// stock. Guarded on the previous state so a repeated cancellation can
    /// never restock twice.
    pub fn restores_stock_on(self, next: OrderStatus) -> bool {
        next == OrderStatus::Cancelado && self != OrderStatus::Cancelado
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub nombre: String,
    pub slug: String,
    pub precio: i64,
    pub precio_oferta: Option<i64>,
    pub stock: i32,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Selling price: the sale price when one is set.
    pub fn precio_vigente(&self) -> i64 {
        self.precio_oferta.unwrap_or(self.precio)
    }
}

/// Order header. Only the status (and the payment proof reference) ever
/// mutate after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub numero_orden: String,
    pub user_id: Uuid,
    pub estado: OrderStatus,
    pub subtotal: i64,
    pub envio: i64,
    pub total: i64,
    pub metodo_pago: PaymentMethod,
    pub comprobante_pago: Option<String>,
    pub direccion_envio: String,
    pub telefono_contacto: Option<String>,
    pub notas: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One order line. `nombre_producto` and `precio_unitario` are snapshots
/// taken at purchase time and are never re-derived from the live product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub orden_id: Uuid,
    pub producto_id: Uuid,
    pub nombre_producto: String,
    pub cantidad: i32,
    pub precio_unitario: i64,
    pub subtotal: i64,
}

/// What the order lists show about the buyer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: Uuid,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
}

/// Order as returned by the API: header, line items, buyer summary.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub orden: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CustomerSummary>,
}

/// Authenticated principal, re-validated against the users table on every
/// request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub nombre: String,
    pub apellido: String,
    pub role: Role,
    pub activo: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Product data embedded in cart responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    pub id: Uuid,
    pub nombre: String,
    pub slug: String,
    pub precio: i64,
    pub precio_oferta: Option<i64>,
    pub stock: i32,
    pub activo: bool,
}

impl CartProduct {
    pub fn precio_vigente(&self) -> i64 {
        self.precio_oferta.unwrap_or(self.precio)
    }
}

/// One cart line joined with its product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub carrito_id: Uuid,
    pub producto_id: Uuid,
    pub cantidad: i32,
    pub producto: CartProduct,
}

/// The cart as the storefront displays it. Inactive products are excluded
/// from the items and the totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub subtotal: i64,
    pub total_items: i32,
    pub updated_at: DateTime<Utc>,
}
