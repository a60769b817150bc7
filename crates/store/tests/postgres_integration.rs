//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{
    DiscountType, Money, OrderStatus, PaymentMethod, PaymentStatus, UserId,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    CartItem, CartRepository, MedicineRepository, NewMedicine, NewOrder, NewPayment,
    NewPromocode, OrderLine, OrderRepository, PaymentRepository, PgStore, PromocodeRepository,
    Store, Transaction,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PgStore {
    let info = get_container_info().await;
    let store = PgStore::connect(&info.connection_string, 5).await.unwrap();

    sqlx::query(
        "TRUNCATE TABLE payments, promocode_redemptions, promocodes, order_lines, orders, \
         cart_items, carts, medicines RESTART IDENTITY",
    )
    .execute(store.pool())
    .await
    .unwrap();

    store
}

fn paracetamol(stock: i64) -> NewMedicine {
    NewMedicine {
        name: "Paracetamol".to_string(),
        description: "500mg tablets".to_string(),
        price: Money::from_minor(350),
        stock_quantity: stock,
        manufacturer: "Acme Pharma".to_string(),
        prescription_required: false,
    }
}

fn new_order(user: UserId, lines: Vec<OrderLine>, total: Money) -> NewOrder {
    NewOrder {
        user_id: user,
        order_status: OrderStatus::Draft,
        total_price: total,
        discount_total: Money::zero(),
        final_price: total,
        delivery_address: "1 Main St".to_string(),
        comment: String::new(),
        promocode: None,
        lines,
    }
}

#[tokio::test]
#[serial]
async fn test_medicine_roundtrip_and_stock_filter() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let stocked = tx.insert_medicine(paracetamol(4)).await.unwrap();
    let empty = tx.insert_medicine(paracetamol(0)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let loaded = tx.get_medicine(stocked.id).await.unwrap().unwrap();
    assert_eq!(loaded, stocked);
    assert!(!empty.in_stock);

    let all = tx.list_medicines(false).await.unwrap();
    let in_stock = tx.list_medicines(true).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(in_stock.len(), 1);
    assert_eq!(in_stock[0].id, stocked.id);
}

#[tokio::test]
#[serial]
async fn test_rollback_on_drop() {
    let store = get_test_store().await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_medicine(paracetamol(4)).await.unwrap();
    }

    let mut tx = store.begin().await.unwrap();
    assert!(tx.list_medicines(false).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_conditional_stock_decrement() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let medicine = tx.insert_medicine(paracetamol(3)).await.unwrap();

    assert!(!tx.decrement_stock(medicine.id, 4).await.unwrap());
    assert!(tx.decrement_stock(medicine.id, 3).await.unwrap());

    let loaded = tx.get_medicine(medicine.id).await.unwrap().unwrap();
    assert_eq!(loaded.stock_quantity, 0);
    assert!(!loaded.in_stock);

    tx.increment_stock(medicine.id, 2).await.unwrap();
    let loaded = tx.get_medicine(medicine.id).await.unwrap().unwrap();
    assert_eq!(loaded.stock_quantity, 2);
    assert!(loaded.in_stock);
}

#[tokio::test]
#[serial]
async fn test_cart_upsert_keeps_insertion_order() {
    let store = get_test_store().await;
    let user = UserId::new(7);

    let mut tx = store.begin().await.unwrap();
    let first = tx.insert_medicine(paracetamol(10)).await.unwrap();
    let second = tx.insert_medicine(paracetamol(10)).await.unwrap();
    let cart = tx.lock_or_create_cart(user).await.unwrap();

    tx.upsert_cart_item(cart.id, &CartItem::for_medicine(&first, 1))
        .await
        .unwrap();
    tx.upsert_cart_item(cart.id, &CartItem::for_medicine(&second, 2))
        .await
        .unwrap();
    tx.upsert_cart_item(cart.id, &CartItem::for_medicine(&first, 5))
        .await
        .unwrap();
    tx.set_cart_total(cart.id, Money::from_minor(2450))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let cart = tx.get_cart(user).await.unwrap().unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.items[0].medicine_id, first.id);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.items[1].medicine_id, second.id);
    assert_eq!(cart.total_price, Money::from_minor(2450));

    assert!(tx.delete_cart_item(cart.id, second.id).await.unwrap());
    assert!(!tx.delete_cart_item(cart.id, second.id).await.unwrap());
    assert_eq!(tx.clear_cart(cart.id).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_lock_or_create_cart_reuses_existing() {
    let store = get_test_store().await;
    let user = UserId::new(3);

    let mut tx = store.begin().await.unwrap();
    let first = tx.lock_or_create_cart(user).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let second = tx.lock_or_create_cart(user).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
#[serial]
async fn test_order_with_lines_and_payments() {
    let store = get_test_store().await;
    let user = UserId::new(11);

    let mut tx = store.begin().await.unwrap();
    let medicine = tx.insert_medicine(paracetamol(10)).await.unwrap();
    let line = OrderLine::from(&CartItem::for_medicine(&medicine, 2));
    let order = tx
        .insert_order(new_order(user, vec![line.clone()], Money::from_minor(700)))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let mut loaded = tx.lock_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.lines, vec![line]);
    assert_eq!(loaded.order_status, OrderStatus::Draft);

    loaded.order_status = OrderStatus::PendingPayment;
    loaded.comment = "ring twice".to_string();
    tx.update_order(&loaded).await.unwrap();

    let mut payment = tx
        .insert_payment(NewPayment {
            order_id: order.id,
            amount: Money::from_minor(700),
            method: PaymentMethod::OnlineWallet,
        })
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(!tx.has_succeeded_payment(order.id).await.unwrap());

    payment.status = PaymentStatus::Succeeded;
    payment.paid_at = Some(payment.created_at);
    tx.update_payment(&payment).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.has_succeeded_payment(order.id).await.unwrap());
    let payments = tx.list_payments_for_order(order.id).await.unwrap();
    assert_eq!(payments, vec![payment]);

    let orders = tx.list_orders_for_user(user).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_status, OrderStatus::PendingPayment);
    assert_eq!(orders[0].comment, "ring twice");
}

#[tokio::test]
#[serial]
async fn test_delete_medicine_keeps_order_history() {
    let store = get_test_store().await;
    let user = UserId::new(12);

    let mut tx = store.begin().await.unwrap();
    let medicine = tx.insert_medicine(paracetamol(10)).await.unwrap();
    let cart = tx.lock_or_create_cart(user).await.unwrap();
    tx.upsert_cart_item(cart.id, &CartItem::for_medicine(&medicine, 1))
        .await
        .unwrap();
    let line = OrderLine::from(&CartItem::for_medicine(&medicine, 2));
    let order = tx
        .insert_order(new_order(user, vec![line.clone()], Money::from_minor(700)))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.count_cart_references(medicine.id).await.unwrap(), 1);
    tx.delete_cart_item(cart.id, medicine.id).await.unwrap();
    assert_eq!(tx.count_cart_references(medicine.id).await.unwrap(), 0);
    assert!(tx.delete_medicine(medicine.id).await.unwrap());
    assert!(!tx.delete_medicine(medicine.id).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_medicine(medicine.id).await.unwrap().is_none());
    let loaded = tx.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.lines, vec![line]);
}

#[tokio::test]
#[serial]
async fn test_promocode_unique_code_and_redemptions() {
    let store = get_test_store().await;
    let user = UserId::new(5);
    let now = Utc::now();
    let promo = NewPromocode {
        code: "SPRING".to_string(),
        description: String::new(),
        discount_type: DiscountType::Percent,
        discount_value: 15,
        valid_from: now - Duration::days(1),
        valid_to: now + Duration::days(1),
        max_uses: Some(10),
        max_uses_per_user: None,
        is_active: true,
    };

    let mut tx = store.begin().await.unwrap();
    let created = tx.insert_promocode(promo.clone()).await.unwrap();
    let order = tx
        .insert_order(new_order(user, Vec::new(), Money::zero()))
        .await
        .unwrap();
    tx.record_redemption(created.id, user, order.id)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.insert_promocode(promo).await.unwrap_err();
    assert!(err.is_unique_violation("promocodes_code_key"));
    drop(tx);

    let mut tx = store.begin().await.unwrap();
    let locked = tx.lock_promocode_by_code("SPRING").await.unwrap().unwrap();
    assert_eq!(locked.id, created.id);
    assert_eq!(tx.count_redemptions(created.id).await.unwrap(), 1);
    assert_eq!(
        tx.count_user_redemptions(created.id, UserId::new(6))
            .await
            .unwrap(),
        0
    );

    assert!(tx.delete_promocode(created.id).await.unwrap());
    assert!(tx.get_promocode(created.id).await.unwrap().is_none());
}
