use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{
    CartId, MedicineId, Money, OrderId, PaymentId, PaymentStatus, PromocodeId, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{
    CartRepository, MedicineRepository, OrderRepository, PaymentRepository, PromocodeRepository,
    Store, Transaction, now,
};
use crate::{
    Cart, CartItem, Medicine, NewMedicine, NewOrder, NewPayment, NewPromocode, Order, Payment,
    Promocode, Result, StoreError,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    medicine: i64,
    cart: i64,
    order: i64,
    promocode: i64,
    payment: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone)]
struct Redemption {
    promocode_id: PromocodeId,
    user_id: UserId,
}

#[derive(Debug, Clone, Default)]
struct State {
    medicines: BTreeMap<MedicineId, Medicine>,
    carts: BTreeMap<CartId, Cart>,
    cart_by_user: HashMap<UserId, CartId>,
    orders: BTreeMap<OrderId, Order>,
    promocodes: BTreeMap<PromocodeId, Promocode>,
    redemptions: Vec<Redemption>,
    payments: BTreeMap<PaymentId, Payment>,
    sequences: Sequences,
}

impl State {
    fn cart_mut(&mut self, cart_id: CartId) -> Result<&mut Cart> {
        self.carts.get_mut(&cart_id).ok_or(StoreError::MissingRow {
            table: "carts",
            id: cart_id.get(),
        })
    }

    fn medicine_mut(&mut self, id: MedicineId) -> Result<&mut Medicine> {
        self.medicines.get_mut(&id).ok_or(StoreError::MissingRow {
            table: "medicines",
            id: id.get(),
        })
    }
}

/// In-memory store implementation for testing and database-less runs.
///
/// Transactions are serialised: `begin` waits for the previous transaction to
/// finish, then works on a private copy of the data which `commit` publishes.
///
/// Every `begin` clones the whole data set, reads included, so the cost of a
/// transaction grows with the number of stored rows. This store is meant for
/// tests and small local runs; use [`PgStore`](crate::PgStore) for real loads.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every following commit to fail with [`StoreError::Unavailable`].
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the stock level of a medicine, if it exists.
    pub async fn stock_of(&self, id: MedicineId) -> Option<i64> {
        self.state
            .lock()
            .await
            .medicines
            .get(&id)
            .map(|m| m.stock_quantity)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

/// A transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
    fail_on_commit: bool,
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
        })
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            mut guard,
            working,
            fail_on_commit,
        } = self;

        if fail_on_commit {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }

        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl MedicineRepository for InMemoryTransaction {
    async fn insert_medicine(&mut self, medicine: NewMedicine) -> Result<Medicine> {
        let id = MedicineId::new(next(&mut self.working.sequences.medicine));
        let timestamp = now();
        let record = Medicine {
            id,
            name: medicine.name,
            description: medicine.description,
            price: medicine.price,
            stock_quantity: medicine.stock_quantity,
            in_stock: medicine.stock_quantity > 0,
            manufacturer: medicine.manufacturer,
            prescription_required: medicine.prescription_required,
            created_at: timestamp,
            updated_at: timestamp,
        };
        self.working.medicines.insert(id, record.clone());
        Ok(record)
    }

    async fn get_medicine(&mut self, id: MedicineId) -> Result<Option<Medicine>> {
        Ok(self.working.medicines.get(&id).cloned())
    }

    async fn lock_medicine(&mut self, id: MedicineId) -> Result<Option<Medicine>> {
        // The whole store is already held by this transaction.
        self.get_medicine(id).await
    }

    async fn list_medicines(&mut self, in_stock_only: bool) -> Result<Vec<Medicine>> {
        Ok(self
            .working
            .medicines
            .values()
            .filter(|m| !in_stock_only || m.stock_quantity > 0)
            .cloned()
            .collect())
    }

    async fn update_medicine(&mut self, medicine: &Medicine) -> Result<()> {
        let stored = self.working.medicine_mut(medicine.id)?;
        *stored = medicine.clone();
        stored.refresh_in_stock();
        Ok(())
    }

    async fn decrement_stock(&mut self, id: MedicineId, quantity: i64) -> Result<bool> {
        let Some(medicine) = self.working.medicines.get_mut(&id) else {
            return Ok(false);
        };
        if medicine.stock_quantity < quantity {
            return Ok(false);
        }
        medicine.stock_quantity -= quantity;
        medicine.refresh_in_stock();
        medicine.updated_at = now();
        Ok(true)
    }

    async fn increment_stock(&mut self, id: MedicineId, quantity: i64) -> Result<()> {
        let medicine = self.working.medicine_mut(id)?;
        medicine.stock_quantity += quantity;
        medicine.refresh_in_stock();
        medicine.updated_at = now();
        Ok(())
    }

    async fn count_cart_references(&mut self, id: MedicineId) -> Result<i64> {
        Ok(self
            .working
            .carts
            .values()
            .flat_map(|cart| cart.items.iter())
            .filter(|item| item.medicine_id == id)
            .count() as i64)
    }

    async fn delete_medicine(&mut self, id: MedicineId) -> Result<bool> {
        Ok(self.working.medicines.remove(&id).is_some())
    }
}

#[async_trait]
impl CartRepository for InMemoryTransaction {
    async fn get_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self
            .working
            .cart_by_user
            .get(&user_id)
            .and_then(|id| self.working.carts.get(id))
            .cloned())
    }

    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.get_cart(user_id).await
    }

    async fn lock_or_create_cart(&mut self, user_id: UserId) -> Result<Cart> {
        if let Some(cart) = self.get_cart(user_id).await? {
            return Ok(cart);
        }

        let id = CartId::new(next(&mut self.working.sequences.cart));
        let timestamp = now();
        let cart = Cart {
            id,
            user_id,
            items: Vec::new(),
            total_price: Money::zero(),
            created_at: timestamp,
            updated_at: timestamp,
        };
        self.working.carts.insert(id, cart.clone());
        self.working.cart_by_user.insert(user_id, id);
        Ok(cart)
    }

    async fn upsert_cart_item(&mut self, cart_id: CartId, item: &CartItem) -> Result<()> {
        let cart = self.working.cart_mut(cart_id)?;
        match cart
            .items
            .iter_mut()
            .find(|existing| existing.medicine_id == item.medicine_id)
        {
            Some(existing) => existing.reprice(item.quantity, item.price_per_unit),
            None => cart.items.push(item.clone()),
        }
        cart.updated_at = now();
        Ok(())
    }

    async fn delete_cart_item(
        &mut self,
        cart_id: CartId,
        medicine_id: MedicineId,
    ) -> Result<bool> {
        let cart = self.working.cart_mut(cart_id)?;
        let before = cart.items.len();
        cart.items.retain(|i| i.medicine_id != medicine_id);
        Ok(cart.items.len() != before)
    }

    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64> {
        let cart = self.working.cart_mut(cart_id)?;
        let removed = cart.items.len() as u64;
        cart.items.clear();
        Ok(removed)
    }

    async fn set_cart_total(&mut self, cart_id: CartId, total: Money) -> Result<()> {
        let cart = self.working.cart_mut(cart_id)?;
        cart.total_price = total;
        cart.updated_at = now();
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let id = OrderId::new(next(&mut self.working.sequences.order));
        let timestamp = now();
        let record = Order {
            id,
            user_id: order.user_id,
            order_status: order.order_status,
            total_price: order.total_price,
            discount_total: order.discount_total,
            final_price: order.final_price,
            delivery_address: order.delivery_address,
            comment: order.comment,
            promocode: order.promocode,
            lines: order.lines,
            created_at: timestamp,
            updated_at: timestamp,
        };
        self.working.orders.insert(id, record.clone());
        Ok(record)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.get_order(id).await
    }

    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let stored = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::MissingRow {
                table: "orders",
                id: order.id.get(),
            })?;
        stored.order_status = order.order_status;
        stored.delivery_address = order.delivery_address.clone();
        stored.comment = order.comment.clone();
        stored.updated_at = order.updated_at;
        Ok(())
    }
}

#[async_trait]
impl PromocodeRepository for InMemoryTransaction {
    async fn insert_promocode(&mut self, promocode: NewPromocode) -> Result<Promocode> {
        if self
            .working
            .promocodes
            .values()
            .any(|p| p.code == promocode.code)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "promocodes_code_key".to_string(),
            });
        }

        let id = PromocodeId::new(next(&mut self.working.sequences.promocode));
        let timestamp = now();
        let record = Promocode {
            id,
            code: promocode.code,
            description: promocode.description,
            discount_type: promocode.discount_type,
            discount_value: promocode.discount_value,
            valid_from: promocode.valid_from,
            valid_to: promocode.valid_to,
            max_uses: promocode.max_uses,
            max_uses_per_user: promocode.max_uses_per_user,
            is_active: promocode.is_active,
            created_at: timestamp,
            updated_at: timestamp,
        };
        self.working.promocodes.insert(id, record.clone());
        Ok(record)
    }

    async fn get_promocode(&mut self, id: PromocodeId) -> Result<Option<Promocode>> {
        Ok(self.working.promocodes.get(&id).cloned())
    }

    async fn lock_promocode_by_code(&mut self, code: &str) -> Result<Option<Promocode>> {
        Ok(self
            .working
            .promocodes
            .values()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn list_promocodes(&mut self) -> Result<Vec<Promocode>> {
        Ok(self.working.promocodes.values().cloned().collect())
    }

    async fn update_promocode(&mut self, promocode: &Promocode) -> Result<()> {
        if self
            .working
            .promocodes
            .values()
            .any(|p| p.id != promocode.id && p.code == promocode.code)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "promocodes_code_key".to_string(),
            });
        }

        let stored =
            self.working
                .promocodes
                .get_mut(&promocode.id)
                .ok_or(StoreError::MissingRow {
                    table: "promocodes",
                    id: promocode.id.get(),
                })?;
        *stored = promocode.clone();
        Ok(())
    }

    async fn delete_promocode(&mut self, id: PromocodeId) -> Result<bool> {
        let removed = self.working.promocodes.remove(&id).is_some();
        if removed {
            self.working.redemptions.retain(|r| r.promocode_id != id);
        }
        Ok(removed)
    }

    async fn count_redemptions(&mut self, id: PromocodeId) -> Result<i64> {
        Ok(self
            .working
            .redemptions
            .iter()
            .filter(|r| r.promocode_id == id)
            .count() as i64)
    }

    async fn count_user_redemptions(&mut self, id: PromocodeId, user_id: UserId) -> Result<i64> {
        Ok(self
            .working
            .redemptions
            .iter()
            .filter(|r| r.promocode_id == id && r.user_id == user_id)
            .count() as i64)
    }

    async fn record_redemption(
        &mut self,
        id: PromocodeId,
        user_id: UserId,
        _order_id: OrderId,
    ) -> Result<()> {
        self.working.redemptions.push(Redemption {
            promocode_id: id,
            user_id,
        });
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryTransaction {
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment> {
        let id = PaymentId::new(next(&mut self.working.sequences.payment));
        let timestamp = now();
        let record = Payment {
            id,
            order_id: payment.order_id,
            amount: payment.amount,
            status: PaymentStatus::Pending,
            method: payment.method,
            paid_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        };
        self.working.payments.insert(id, record.clone());
        Ok(record)
    }

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        self.get_payment(id).await
    }

    async fn list_payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        let stored = self
            .working
            .payments
            .get_mut(&payment.id)
            .ok_or(StoreError::MissingRow {
                table: "payments",
                id: payment.id.get(),
            })?;
        stored.status = payment.status;
        stored.paid_at = payment.paid_at;
        stored.updated_at = payment.updated_at;
        Ok(())
    }

    async fn has_succeeded_payment(&mut self, order_id: OrderId) -> Result<bool> {
        Ok(self
            .working
            .payments
            .values()
            .any(|p| p.order_id == order_id && p.status == PaymentStatus::Succeeded))
    }
}
