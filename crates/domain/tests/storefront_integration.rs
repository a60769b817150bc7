//! Integration tests for the storefront core.
//!
//! These tests drive the services end to end over the in-memory store:
//! cart totals, stock limits under concurrency, checkout with promocodes and
//! the order lifecycle through the payment ledger.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{
    DiscountType, MedicineId, Money, OrderStatus, PaymentMethod, PaymentStatus, UserId,
};
use domain::{
    CartService, CreateOrder, DomainError, MedicineService, OrderService, PaymentService,
    PromocodeService, RecordPayment,
};
use futures_util::future::join_all;
use store::{InMemoryStore, NewMedicine, NewPromocode};

struct Storefront {
    store: InMemoryStore,
    medicines: MedicineService<InMemoryStore>,
    carts: Arc<CartService<InMemoryStore>>,
    orders: OrderService<InMemoryStore>,
    payments: PaymentService<InMemoryStore>,
    promocodes: PromocodeService<InMemoryStore>,
}

/// Helper to create every service over one shared store
fn storefront() -> Storefront {
    let store = InMemoryStore::new();
    Storefront {
        medicines: MedicineService::new(store.clone()),
        carts: Arc::new(CartService::new(store.clone())),
        orders: OrderService::new(store.clone()),
        payments: PaymentService::new(store.clone()),
        promocodes: PromocodeService::new(store.clone()),
        store,
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

    async fn promocode(&self, promocode: NewPromocode) {
        self.promocodes.create_promocode(promocode).await.unwrap();
    }
}

fn save10() -> NewPromocode {
    let now = Utc::now();
    NewPromocode {
        code: "SAVE10".to_string(),
        description: "10% off".to_string(),
        discount_type: DiscountType::Percent,
        discount_value: 10,
        valid_from: now - Duration::days(1),
        valid_to: now + Duration::days(1),
        max_uses: None,
        max_uses_per_user: None,
        is_active: true,
    }
}

mod cart_mutation {
    use super::*;

    #[tokio::test]
    async fn total_tracks_line_totals() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 1_000, 10).await;
        let b = shop.medicine("B", 250, 10).await;

        shop.carts.add_item(user, a, 2).await.unwrap();
        let cart = shop.carts.add_item(user, b, 3).await.unwrap();
        assert_eq!(cart.total_price, Money::from_minor(2_750));

        let cart = shop.carts.update_item_quantity(user, a, 1).await.unwrap();
        assert_eq!(cart.total_price, Money::from_minor(1_750));

        let cart = shop.carts.remove_item(user, b).await.unwrap();
        assert_eq!(cart.total_price, Money::from_minor(1_000));

        shop.carts.clear_cart(user).await.unwrap();
        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.total_price, Money::zero());
    }

    #[tokio::test]
    async fn adding_same_medicine_merges_lines() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 400, 10).await;

        shop.carts.add_item(user, a, 3).await.unwrap();
        let cart = shop.carts.add_item(user, a, 4).await.unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 7);
        assert_eq!(cart.items[0].line_total, Money::from_minor(2_800));
    }

    #[tokio::test]
    async fn out_of_stock_leaves_cart_untouched() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 1_000, 5).await;

        shop.carts.add_item(user, a, 2).await.unwrap();
        let err = shop.carts.add_item(user, a, 4).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::OutOfStock {
                requested: 6,
                available: 5,
                ..
            }
        ));

        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.items[0].line_total, Money::from_minor(2_000));
    }

    #[tokio::test]
    async fn price_snapshot_refreshes_on_later_add() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 1_000, 10).await;

        shop.carts.add_item(user, a, 1).await.unwrap();
        shop.medicines
            .update_medicine(
                a,
                domain::MedicineUpdate {
                    price: common::Patch::Present(Money::from_minor(1_200)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cart = shop.carts.add_item(user, a, 1).await.unwrap();
        assert_eq!(cart.items[0].price_per_unit, Money::from_minor(1_200));
        assert_eq!(cart.total_price, Money::from_minor(2_400));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_never_exceed_stock() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 100, 5).await;

        let tasks = (0..10).map(|_| {
            let carts = Arc::clone(&shop.carts);
            tokio::spawn(async move { carts.add_item(user, a, 1).await })
        });
        let results = join_all(tasks).await;

        let succeeded = results
            .into_iter()
            .map(|joined| joined.unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(succeeded, 5);

        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.items[0].quantity, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_of_different_medicines_all_land() {
        let shop = storefront();
        let user = UserId::new(2);
        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(shop.medicine(&format!("M{i}"), 100, 1).await);
        }

        let tasks = ids.iter().map(|&id| {
            let carts = Arc::clone(&shop.carts);
            tokio::spawn(async move { carts.add_item(user, id, 1).await })
        });
        for joined in join_all(tasks).await {
            joined.unwrap().unwrap();
        }

        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.items.len(), 6);
        assert_eq!(cart.total_price, Money::from_minor(600));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn checkout_racing_add_sees_whole_cart_or_empty_cart() {
        let shop = Arc::new(storefront());
        let user = UserId::new(3);
        let a = shop.medicine("A", 100, 50).await;
        shop.carts.add_item(user, a, 2).await.unwrap();

        let adder = {
            let carts = Arc::clone(&shop.carts);
            tokio::spawn(async move { carts.add_item(user, a, 1).await })
        };
        let order = shop
            .orders
            .create_order(CreateOrder::new(user, "1 Main St"))
            .await
            .unwrap();
        adder.await.unwrap().unwrap();

        let cart = shop.carts.get_cart(user).await.unwrap();
        let ordered = order.lines[0].quantity;
        let left = cart.items.first().map_or(0, |i| i.quantity);
        assert_eq!(ordered + left, 3);
        assert!(left == 0 || left == 1);
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn empty_cart_creates_no_order() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 100, 5).await;

        shop.carts.add_item(user, a, 1).await.unwrap();
        shop.carts.clear_cart(user).await.unwrap();

        let err = shop
            .orders
            .create_order(CreateOrder::new(user, "1 Main St"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::CartEmpty(_)));
        assert_eq!(shop.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn save10_example() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 5_000, 5).await;
        shop.promocode(save10()).await;
        shop.carts.add_item(user, a, 2).await.unwrap();

        let order = shop
            .orders
            .create_order(CreateOrder::new(user, "1 Main St").with_promocode("SAVE10"))
            .await
            .unwrap();

        assert_eq!(order.total_price, Money::from_minor(10_000));
        assert_eq!(order.discount_total, Money::from_minor(1_000));
        assert_eq!(order.final_price, Money::from_minor(9_000));
        assert_eq!(order.promocode.as_deref(), Some("SAVE10"));

        let cart = shop.carts.get_cart(user).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(shop.store.stock_of(a).await, Some(3));
    }

    #[tokio::test]
    async fn fixed_discount_floors_final_price_at_zero() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 300, 5).await;
        shop.promocode(NewPromocode {
            code: "BIG".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: 10_000,
            ..save10()
        })
        .await;
        shop.carts.add_item(user, a, 1).await.unwrap();

        let order = shop
            .orders
            .create_order(CreateOrder::new(user, "1 Main St").with_promocode("BIG"))
            .await
            .unwrap();

        assert_eq!(order.final_price, Money::zero());
        assert_eq!(order.discount_total, order.total_price);
        assert_eq!(order.final_price, order.total_price - order.discount_total);
    }

    #[tokio::test]
    async fn promocode_failure_keeps_cart_and_stock() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 300, 5).await;
        shop.carts.add_item(user, a, 2).await.unwrap();

        let err = shop
            .orders
            .create_order(CreateOrder::new(user, "1 Main St").with_promocode("NOPE"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROMOCODE_NOT_FOUND");

        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(shop.store.stock_of(a).await, Some(5));
        assert_eq!(shop.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn per_user_cap_counts_redemptions() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 300, 10).await;
        shop.promocode(NewPromocode {
            max_uses_per_user: Some(1),
            ..save10()
        })
        .await;

        shop.carts.add_item(user, a, 1).await.unwrap();
        shop.orders
            .create_order(CreateOrder::new(user, "1 Main St").with_promocode("SAVE10"))
            .await
            .unwrap();

        shop.carts.add_item(user, a, 1).await.unwrap();
        let err = shop
            .orders
            .create_order(CreateOrder::new(user, "1 Main St").with_promocode("SAVE10"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PromocodeUserLimitReached(_)));
    }

    #[tokio::test]
    async fn expired_promocode_at_checkout_time() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 300, 10).await;
        shop.promocode(save10()).await;
        shop.carts.add_item(user, a, 1).await.unwrap();

        let err = shop
            .orders
            .create_order(
                CreateOrder::new(user, "1 Main St")
                    .with_promocode("SAVE10")
                    .at(Utc::now() + Duration::days(2)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PromocodeExpired(_)));
    }

    #[tokio::test]
    async fn orders_are_listed_newest_first() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 300, 10).await;

        let mut created = Vec::new();
        for _ in 0..3 {
            shop.carts.add_item(user, a, 1).await.unwrap();
            created.push(
                shop.orders
                    .create_order(CreateOrder::new(user, "1 Main St"))
                    .await
                    .unwrap()
                    .id,
            );
        }

        let listed: Vec<_> = shop
            .orders
            .list_orders(user)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        created.reverse();
        assert_eq!(listed, created);
    }
}

mod lifecycle {
    use super::*;

    async fn placed_order(shop: &Storefront) -> domain::CreateOrder {
        let user = UserId::new(1);
        let a = shop.medicine("A", 1_000, 10).await;
        shop.carts.add_item(user, a, 1).await.unwrap();
        CreateOrder::new(user, "1 Main St")
    }

    #[tokio::test]
    async fn full_lifecycle_through_payment() {
        let shop = storefront();
        let cmd = placed_order(&shop).await;
        let order = shop.orders.create_order(cmd).await.unwrap();

        let payment = shop
            .payments
            .record_payment(RecordPayment {
                order_id: order.id,
                amount: order.final_price,
                method: PaymentMethod::OnlineWallet,
            })
            .await
            .unwrap();
        assert_eq!(
            shop.orders.get_order(order.id).await.unwrap().order_status,
            OrderStatus::PendingPayment
        );

        shop.payments
            .update_payment_status(payment.id, PaymentStatus::Succeeded)
            .await
            .unwrap();
        assert_eq!(
            shop.orders.get_order(order.id).await.unwrap().order_status,
            OrderStatus::Paid
        );

        shop.orders
            .transition_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        let done = shop
            .orders
            .transition_status(order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.order_status, OrderStatus::Completed);
        assert_eq!(done.final_price, order.final_price);
    }

    #[tokio::test]
    async fn terminal_states_reject_every_transition() {
        let shop = storefront();
        let cmd = placed_order(&shop).await;
        let order = shop.orders.create_order(cmd).await.unwrap();
        shop.orders
            .transition_status(order.id, OrderStatus::Canceled)
            .await
            .unwrap();

        for target in OrderStatus::ALL {
            let err = shop
                .orders
                .transition_status(order.id, target)
                .await
                .unwrap_err();
            assert!(
                matches!(err, DomainError::IllegalTransition { .. }),
                "{target}"
            );
        }
    }

    #[tokio::test]
    async fn draft_cannot_jump_to_shipped() {
        let shop = storefront();
        let cmd = placed_order(&shop).await;
        let order = shop.orders.create_order(cmd).await.unwrap();

        let err = shop
            .orders
            .transition_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::IllegalTransition {
                from: OrderStatus::Draft,
                to: OrderStatus::Shipped
            }
        ));
    }

    #[tokio::test]
    async fn missing_order() {
        let shop = storefront();
        let err = shop
            .orders
            .transition_status(common::OrderId::new(9), OrderStatus::Canceled)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_checkout() {
        let shop = storefront();
        let user = UserId::new(1);
        let a = shop.medicine("A", 300, 5).await;
        shop.carts.add_item(user, a, 2).await.unwrap();

        shop.store.set_fail_on_commit(true);
        let err = shop
            .orders
            .create_order(CreateOrder::new(user, "1 Main St"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INTERNAL");
        shop.store.set_fail_on_commit(false);

        assert_eq!(shop.store.order_count().await, 0);
        assert_eq!(shop.store.stock_of(a).await, Some(5));
        let cart = shop.carts.get_cart(user).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
    }
}
