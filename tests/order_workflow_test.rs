//! End-to-end tests of the order workflow against a real Postgres.
//!
//! Each test skips with a notice when no database is reachable.

mod common;

use std::sync::Arc;

use serial_test::serial;
use sqlx::PgPool;

use tienda_api::error::AppError;
use tienda_api::models::{OrderStatus, Role};
use tienda_api::orders::{CheckoutRequest, OrderService, ShippingDetails, UpdateOrderRequest};
use tienda_api::repositories::carts;

fn service(pool: &PgPool) -> OrderService {
    OrderService::new(Arc::new(pool.clone()), 0)
}

fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        datos_envio: Some(ShippingDetails {
            direccion: "Av. Siempre Viva 742".into(),
            ciudad: "La Paz".into(),
            referencia: None,
            telefono: Some("70000000".into()),
        }),
        comprobante_pago: Some("https://storage.example/comprobantes/abc.jpg".into()),
        metodo_pago: None,
        notas: None,
    }
}

fn set_estado(estado: &str) -> UpdateOrderRequest {
    UpdateOrderRequest {
        estado: Some(estado.into()),
        comprobante_pago: None,
    }
}

macro_rules! require_db {
    () => {
        match common::try_setup().await {
            Some(pool) => pool,
            None => {
                eprintln!("skipping: test database unavailable");
                return;
            }
        }
    };
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn checkout_creates_order_and_decrements_stock() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let producto = common::seed_product(&pool, "Teclado mecánico", 100_00, 5).await;
    common::add_to_cart(&pool, user.id, producto, 2).await;

    let svc = service(&pool);
    let orden = svc
        .checkout(&user, checkout_request())
        .await
        .expect("checkout should succeed");

    assert_eq!(orden.orden.estado, OrderStatus::Verificando);
    assert_eq!(orden.orden.subtotal, 200_00);
    assert_eq!(orden.orden.total, 200_00);
    assert_eq!(orden.items.len(), 1);
    assert_eq!(orden.items[0].cantidad, 2);
    assert_eq!(orden.items[0].precio_unitario, 100_00);
    assert_eq!(common::stock_of(&pool, producto).await, 3);

    // the cart is emptied only after the transaction commits
    let lines = carts::lines_for_user(&pool, user.id).await.unwrap();
    assert!(lines.is_empty());

    // reachable by numero_orden as well as by id
    let por_numero = svc.get(&user, &orden.orden.numero_orden).await.unwrap();
    assert_eq!(por_numero.orden.id, orden.orden.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn insufficient_stock_fails_the_whole_order() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let producto = common::seed_product(&pool, "Laptop gamer", 8500_00, 1).await;
    common::add_to_cart(&pool, user.id, producto, 2).await;

    let err = service(&pool)
        .checkout(&user, checkout_request())
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock { nombre, disponible } => {
            assert_eq!(nombre, "Laptop gamer");
            assert_eq!(disponible, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(common::orders_count(&pool).await, 0);
    assert_eq!(common::stock_of(&pool, producto).await, 1);
    // the cart survives the failed attempt
    assert_eq!(carts::lines_for_user(&pool, user.id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn inactive_product_fails_the_whole_order() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let activo = common::seed_product(&pool, "Monitor 24", 1200_00, 4).await;
    let descontinuado = common::seed_product(&pool, "Webcam HD", 300_00, 4).await;
    common::add_to_cart(&pool, user.id, activo, 1).await;
    common::add_to_cart(&pool, user.id, descontinuado, 1).await;
    common::deactivate_product(&pool, descontinuado).await;

    let err = service(&pool)
        .checkout(&user, checkout_request())
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::Validation(msg) if msg == "Producto no disponible: Webcam HD")
    );

    // no line is silently dropped: nothing was created or decremented
    assert_eq!(common::orders_count(&pool).await, 0);
    assert_eq!(common::stock_of(&pool, activo).await, 4);
    assert_eq!(common::stock_of(&pool, descontinuado).await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn snapshots_survive_product_mutation() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let producto = common::seed_product(&pool, "Widget", 100_00, 5).await;
    common::add_to_cart(&pool, user.id, producto, 1).await;

    let svc = service(&pool);
    let orden = svc.checkout(&user, checkout_request()).await.unwrap();

    sqlx::query("UPDATE productos SET nombre = 'Gadget', precio = $2 WHERE id = $1")
        .bind(producto)
        .bind(150_00_i64)
        .execute(&pool)
        .await
        .unwrap();

    let releida = svc.get(&user, &orden.orden.id.to_string()).await.unwrap();
    assert_eq!(releida.items[0].nombre_producto, "Widget");
    assert_eq!(releida.items[0].precio_unitario, 100_00);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn approving_payment_does_not_touch_stock() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let admin = common::seed_user(&pool, Role::Admin).await;
    let producto = common::seed_product(&pool, "Teclado mecánico", 100_00, 5).await;
    common::add_to_cart(&pool, user.id, producto, 2).await;

    let svc = service(&pool);
    let orden = svc.checkout(&user, checkout_request()).await.unwrap();
    assert_eq!(common::stock_of(&pool, producto).await, 3);

    let pagada = svc
        .update(&admin, &orden.orden.id.to_string(), set_estado("PAGADO"))
        .await
        .unwrap();
    assert_eq!(pagada.orden.estado, OrderStatus::Pagado);
    assert_eq!(common::stock_of(&pool, producto).await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn cancellation_restores_stock_exactly_once() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let admin = common::seed_user(&pool, Role::Admin).await;
    let producto_c = common::seed_product(&pool, "Producto C", 50_00, 10).await;
    let producto_d = common::seed_product(&pool, "Producto D", 80_00, 7).await;
    common::add_to_cart(&pool, user.id, producto_c, 2).await;
    common::add_to_cart(&pool, user.id, producto_d, 1).await;

    let svc = service(&pool);
    let orden = svc.checkout(&user, checkout_request()).await.unwrap();
    assert_eq!(common::stock_of(&pool, producto_c).await, 8);
    assert_eq!(common::stock_of(&pool, producto_d).await, 6);

    let referencia = orden.orden.id.to_string();
    svc.update(&admin, &referencia, set_estado("PROCESANDO"))
        .await
        .unwrap();

    let cancelada = svc
        .update(&admin, &referencia, set_estado("CANCELADO"))
        .await
        .unwrap();
    assert_eq!(cancelada.orden.estado, OrderStatus::Cancelado);
    assert_eq!(common::stock_of(&pool, producto_c).await, 10);
    assert_eq!(common::stock_of(&pool, producto_d).await, 7);

    // cancelling again is a no-op for stock
    let recancelada = svc
        .update(&admin, &referencia, set_estado("CANCELADO"))
        .await
        .unwrap();
    assert_eq!(recancelada.orden.estado, OrderStatus::Cancelado);
    assert_eq!(common::stock_of(&pool, producto_c).await, 10);
    assert_eq!(common::stock_of(&pool, producto_d).await, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn terminal_orders_reject_state_changes() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let admin = common::seed_user(&pool, Role::Admin).await;
    let producto = common::seed_product(&pool, "Mouse inalámbrico", 99_00, 5).await;
    common::add_to_cart(&pool, user.id, producto, 1).await;

    let svc = service(&pool);
    let orden = svc.checkout(&user, checkout_request()).await.unwrap();
    let referencia = orden.orden.id.to_string();

    svc.update(&admin, &referencia, set_estado("ENTREGADO"))
        .await
        .unwrap();

    let err = svc
        .update(&admin, &referencia, set_estado("PROCESANDO"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = svc
        .update(&admin, &referencia, set_estado("EN_CAMINO"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(msg) if msg.contains("Valores permitidos")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn customer_attaches_proof_only_while_pending() {
    let pool = require_db!();
    let user = common::seed_user(&pool, Role::Customer).await;
    let admin = common::seed_user(&pool, Role::Admin).await;
    let producto = common::seed_product(&pool, "Auriculares", 250_00, 5).await;
    common::add_to_cart(&pool, user.id, producto, 1).await;

    let svc = service(&pool);
    let orden = svc.checkout(&user, checkout_request()).await.unwrap();
    let referencia = orden.orden.id.to_string();

    // admin rejects the proof: back to PENDIENTE
    svc.update(&admin, &referencia, set_estado("PENDIENTE"))
        .await
        .unwrap();

    let nuevo_comprobante = UpdateOrderRequest {
        estado: None,
        comprobante_pago: Some("https://storage.example/comprobantes/reintento.jpg".into()),
    };
    let verificando = svc
        .update(&user, &referencia, nuevo_comprobante.clone())
        .await
        .unwrap();
    assert_eq!(verificando.orden.estado, OrderStatus::Verificando);
    assert_eq!(
        verificando.orden.comprobante_pago.as_deref(),
        Some("https://storage.example/comprobantes/reintento.jpg")
    );

    // once approved, the customer can no longer touch the order
    svc.update(&admin, &referencia, set_estado("PAGADO"))
        .await
        .unwrap();
    let err = svc
        .update(&user, &referencia, nuevo_comprobante)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(msg) if msg == "No puedes modificar esta orden"));

    // a customer-sent estado change is never honored either
    let err = svc
        .update(&user, &referencia, set_estado("ENTREGADO"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn customers_cannot_see_or_touch_foreign_orders() {
    let pool = require_db!();
    let duenia = common::seed_user(&pool, Role::Customer).await;
    let intrusa = common::seed_user(&pool, Role::Customer).await;
    let producto = common::seed_product(&pool, "Parlante", 400_00, 5).await;
    common::add_to_cart(&pool, duenia.id, producto, 1).await;

    let svc = service(&pool);
    let orden = svc.checkout(&duenia, checkout_request()).await.unwrap();
    let referencia = orden.orden.id.to_string();

    let err = svc.get(&intrusa, &referencia).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = svc
        .update(
            &intrusa,
            &referencia,
            UpdateOrderRequest {
                estado: None,
                comprobante_pago: Some("https://storage.example/x.jpg".into()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = svc.get(&intrusa, "ORD-000000-XXXXXX").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn listing_is_scoped_and_filtered() {
    let pool = require_db!();
    let cliente_a = common::seed_user(&pool, Role::Customer).await;
    let cliente_b = common::seed_user(&pool, Role::Customer).await;
    let admin = common::seed_user(&pool, Role::Admin).await;
    let producto = common::seed_product(&pool, "Cargador", 60_00, 20).await;

    let svc = service(&pool);
    common::add_to_cart(&pool, cliente_a.id, producto, 1).await;
    let orden_a = svc.checkout(&cliente_a, checkout_request()).await.unwrap();
    common::add_to_cart(&pool, cliente_b.id, producto, 2).await;
    svc.checkout(&cliente_b, checkout_request()).await.unwrap();

    // customers only ever see their own orders
    let (propias, total) = svc.list(&cliente_a, None, None, 10, 0).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(propias.len(), 1);
    assert_eq!(propias[0].orden.id, orden_a.orden.id);

    // even when asking for someone else's
    let (ajenas, total) = svc
        .list(&cliente_a, None, Some(cliente_b.id), 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(ajenas[0].orden.user_id, cliente_a.id);

    // admins see everything and can filter
    let (todas, total) = svc.list(&admin, None, None, 10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(todas.len(), 2);

    svc.update(&admin, &orden_a.orden.id.to_string(), set_estado("PAGADO"))
        .await
        .unwrap();
    let (pagadas, total) = svc
        .list(&admin, Some(OrderStatus::Pagado), None, 10, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(pagadas[0].orden.id, orden_a.orden.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_checkouts_never_oversell() {
    let pool = require_db!();
    let cliente_a = common::seed_user(&pool, Role::Customer).await;
    let cliente_b = common::seed_user(&pool, Role::Customer).await;
    let producto = common::seed_product(&pool, "Edición limitada", 500_00, 5).await;
    common::add_to_cart(&pool, cliente_a.id, producto, 3).await;
    common::add_to_cart(&pool, cliente_b.id, producto, 3).await;

    let svc_a = service(&pool);
    let svc_b = svc_a.clone();
    let user_a = cliente_a.clone();
    let user_b = cliente_b.clone();

    let task_a = tokio::spawn(async move { svc_a.checkout(&user_a, checkout_request()).await });
    let task_b = tokio::spawn(async move { svc_b.checkout(&user_b, checkout_request()).await });
    let (result_a, result_b) = (task_a.await.unwrap(), task_b.await.unwrap());

    let exitos = [&result_a, &result_b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(exitos, 1, "exactly one of the competing checkouts must win");

    let perdedor = if result_a.is_err() { result_a } else { result_b };
    match perdedor.unwrap_err() {
        AppError::InsufficientStock { disponible, .. } => assert!(disponible < 3),
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    let stock_final = common::stock_of(&pool, producto).await;
    assert_eq!(stock_final, 2);
    assert_eq!(common::orders_count(&pool).await, 1);

    // the losing buyer keeps their cart to retry with a smaller quantity
    let carritos_restantes = carts::lines_for_user(&pool, cliente_a.id).await.unwrap().len()
        + carts::lines_for_user(&pool, cliente_b.id).await.unwrap().len();
    assert_eq!(carritos_restantes, 1);
}
