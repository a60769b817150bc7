//! Concurrency tests against PostgreSQL.
//!
//! The in-memory store serialises whole transactions, so row locking is only
//! exercised here. Run with:
//!
//! ```bash
//! cargo test -p domain --test postgres_races -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{MedicineId, Money, OrderStatus, UserId};
use domain::{CartService, CreateOrder, DomainError, MedicineService, OrderService};
use futures_util::future::join_all;
use serial_test::serial;
use sqlx::PgPool;
use store::{NewMedicine, PgStore};
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

struct Storefront {
    medicines: MedicineService<PgStore>,
    carts: Arc<CartService<PgStore>>,
    orders: Arc<OrderService<PgStore>>,
}

/// Services over a fresh pool with cleared tables. The pool is larger than
/// the number of concurrent tasks so that every task holds a connection.
async fn storefront() -> Storefront {
    let info = get_container_info().await;
    let store = PgStore::connect(&info.connection_string, 20).await.unwrap();

    sqlx::query(
        "TRUNCATE TABLE payments, promocode_redemptions, promocodes, order_lines, orders, \
         cart_items, carts, medicines RESTART IDENTITY",
    )
    .execute(store.pool())
    .await
    .unwrap();

    Storefront {
        medicines: MedicineService::new(store.clone()),
        carts: Arc::new(CartService::new(store.clone())),
        orders: Arc::new(OrderService::new(store)),
    }
}

impl Storefront {
    async fn medicine(&self, name: &str, price: i64, stock: i64) -> MedicineId {
        self.medicines
            .create_medicine(NewMedicine {
                name: name.to_string(),
                description: String::new(),
                price: Money::from_minor(price),
                stock_quantity: stock,
                manufacturer: "Generic Labs".to_string(),
                prescription_required: false,
            })
            .await
            .unwrap()
            .id
    }

    async fn stock(&self, id: MedicineId) -> i64 {
        self.medicines.get_medicine(id).await.unwrap().stock_quantity
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_adds_never_exceed_stock() {
    let shop = storefront().await;
    let user = UserId::new(1);
    let a = shop.medicine("A", 100, 5).await;

    let tasks = (0..10).map(|_| {
        let carts = Arc::clone(&shop.carts);
        tokio::spawn(async move { carts.add_item(user, a, 1).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 5);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(err, DomainError::OutOfStock { .. }), "{err}");
    }

    let cart = shop.carts.get_cart(user).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.total_price, Money::from_minor(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_checkout_racing_add_keeps_every_unit() {
    let shop = storefront().await;
    let a = shop.medicine("A", 100, 100).await;

    for round in 0..10 {
        let user = UserId::new(100 + round);
        shop.carts.add_item(user, a, 2).await.unwrap();

        let adder = {
            let carts = Arc::clone(&shop.carts);
            tokio::spawn(async move { carts.add_item(user, a, 1).await })
        };
        let checkout = {
            let orders = Arc::clone(&shop.orders);
            tokio::spawn(
                async move { orders.create_order(CreateOrder::new(user, "1 Main St")).await },
            )
        };
        adder.await.unwrap().unwrap();
        let order = checkout.await.unwrap().unwrap();

        let cart = shop.carts.get_cart(user).await.unwrap();
        let ordered = order.lines[0].quantity;
        let left = cart.items.first().map_or(0, |i| i.quantity);
        assert_eq!(ordered + left, 3, "round {round}");
        assert!(left == 0 || left == 1, "round {round}");
        assert_eq!(
            cart.total_price,
            Money::from_minor(100 * left),
            "round {round}"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_crossed_checkouts_do_not_deadlock() {
    let shop = storefront().await;
    let a = shop.medicine("A", 100, 1_000).await;
    let b = shop.medicine("B", 200, 1_000).await;

    let rounds = 10;
    for round in 0..rounds {
        let first = UserId::new(1_000 + 2 * round);
        let second = UserId::new(1_001 + 2 * round);
        shop.carts.add_item(first, a, 1).await.unwrap();
        shop.carts.add_item(first, b, 1).await.unwrap();
        shop.carts.add_item(second, b, 1).await.unwrap();
        shop.carts.add_item(second, a, 1).await.unwrap();

        let tasks = [first, second].map(|user| {
            let orders = Arc::clone(&shop.orders);
            tokio::spawn(
                async move { orders.create_order(CreateOrder::new(user, "1 Main St")).await },
            )
        });
        for joined in join_all(tasks).await {
            let order = joined.unwrap().unwrap();
            assert_eq!(order.total_price, Money::from_minor(300));
        }
    }

    assert_eq!(shop.stock(a).await, 1_000 - 2 * rounds);
    assert_eq!(shop.stock(b).await, 1_000 - 2 * rounds);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_cancel_racing_checkout_restores_stock() {
    let shop = storefront().await;
    let a = shop.medicine("A", 100, 1_000).await;
    let b = shop.medicine("B", 200, 1_000).await;

    let rounds = 10;
    for round in 0..rounds {
        let canceler = UserId::new(2_000 + 2 * round);
        let buyer = UserId::new(2_001 + 2 * round);
        shop.carts.add_item(canceler, b, 1).await.unwrap();
        shop.carts.add_item(canceler, a, 1).await.unwrap();
        let placed = shop
            .orders
            .create_order(CreateOrder::new(canceler, "1 Main St"))
            .await
            .unwrap();
        shop.carts.add_item(buyer, a, 1).await.unwrap();
        shop.carts.add_item(buyer, b, 1).await.unwrap();

        let cancel = {
            let orders = Arc::clone(&shop.orders);
            tokio::spawn(async move {
                orders
                    .transition_status(placed.id, OrderStatus::Canceled)
                    .await
            })
        };
        let checkout = {
            let orders = Arc::clone(&shop.orders);
            tokio::spawn(
                async move { orders.create_order(CreateOrder::new(buyer, "2 Main St")).await },
            )
        };
        let canceled = cancel.await.unwrap().unwrap();
        assert_eq!(canceled.order_status, OrderStatus::Canceled);
        checkout.await.unwrap().unwrap();
    }

    assert_eq!(shop.stock(a).await, 1_000 - rounds);
    assert_eq!(shop.stock(b).await, 1_000 - rounds);
}
