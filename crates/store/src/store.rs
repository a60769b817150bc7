use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use common::{CartId, MedicineId, Money, OrderId, PaymentId, PromocodeId, UserId};

use crate::{
    Cart, CartItem, Medicine, NewMedicine, NewOrder, NewPayment, NewPromocode, Order, Payment,
    Promocode, Result,
};

/// Inventory reads and stock adjustments.
#[async_trait]
pub trait MedicineRepository: Send {
    async fn insert_medicine(&mut self, medicine: NewMedicine) -> Result<Medicine>;

    async fn get_medicine(&mut self, id: MedicineId) -> Result<Option<Medicine>>;

    /// Reads a medicine and holds its row until the transaction ends.
    ///
    /// Every path that checks stock before writing goes through this method so
    /// that two transactions cannot both pass the same check.
    async fn lock_medicine(&mut self, id: MedicineId) -> Result<Option<Medicine>>;

    /// Lists medicines ordered by id.
    async fn list_medicines(&mut self, in_stock_only: bool) -> Result<Vec<Medicine>>;

    async fn update_medicine(&mut self, medicine: &Medicine) -> Result<()>;

    /// Removes `quantity` units if at least that many are in stock.
    ///
    /// Returns false (and changes nothing) when stock is insufficient.
    async fn decrement_stock(&mut self, id: MedicineId, quantity: i64) -> Result<bool>;

    async fn increment_stock(&mut self, id: MedicineId, quantity: i64) -> Result<()>;

    /// Counts the cart lines that reference the medicine.
    async fn count_cart_references(&mut self, id: MedicineId) -> Result<i64>;

    /// Deletes a medicine. Returns false when it did not exist.
    ///
    /// Callers must first lock the row and check that no cart line references
    /// it. Order lines keep their copy of the name and price.
    async fn delete_medicine(&mut self, id: MedicineId) -> Result<bool>;
}

/// Carts and their lines.
#[async_trait]
pub trait CartRepository: Send {
    /// Loads a user's cart with its lines, in insertion order.
    async fn get_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Loads and locks a user's cart.
    async fn lock_cart(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Loads and locks a user's cart, creating an empty one first if needed.
    async fn lock_or_create_cart(&mut self, user_id: UserId) -> Result<Cart>;

    /// Inserts the line, or updates quantity and pricing of the existing line
    /// for the same medicine.
    async fn upsert_cart_item(&mut self, cart_id: CartId, item: &CartItem) -> Result<()>;

    async fn delete_cart_item(&mut self, cart_id: CartId, medicine_id: MedicineId)
    -> Result<bool>;

    /// Removes every line of the cart; returns the number removed.
    async fn clear_cart(&mut self, cart_id: CartId) -> Result<u64>;

    /// Stores the recomputed total alongside the cart row.
    async fn set_cart_total(&mut self, cart_id: CartId, total: Money) -> Result<()>;
}

/// Orders and their lines.
#[async_trait]
pub trait OrderRepository: Send {
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    /// Persists the mutable fields: status, delivery address, comment and
    /// `updated_at`. Prices and lines are written once by `insert_order`.
    async fn update_order(&mut self, order: &Order) -> Result<()>;
}

/// Promocodes and their redemption ledger.
#[async_trait]
pub trait PromocodeRepository: Send {
    async fn insert_promocode(&mut self, promocode: NewPromocode) -> Result<Promocode>;

    async fn get_promocode(&mut self, id: PromocodeId) -> Result<Option<Promocode>>;

    /// Loads and locks a promocode by its code.
    async fn lock_promocode_by_code(&mut self, code: &str) -> Result<Option<Promocode>>;

    async fn list_promocodes(&mut self) -> Result<Vec<Promocode>>;

    async fn update_promocode(&mut self, promocode: &Promocode) -> Result<()>;

    async fn delete_promocode(&mut self, id: PromocodeId) -> Result<bool>;

    async fn count_redemptions(&mut self, id: PromocodeId) -> Result<i64>;

    async fn count_user_redemptions(&mut self, id: PromocodeId, user_id: UserId) -> Result<i64>;

    async fn record_redemption(
        &mut self,
        id: PromocodeId,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<()>;
}

/// The payment ledger.
#[async_trait]
pub trait PaymentRepository: Send {
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment>;

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>>;

    async fn lock_payment(&mut self, id: PaymentId) -> Result<Option<Payment>>;

    /// Lists an order's payments, oldest first.
    async fn list_payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>>;

    /// Persists status, `paid_at` and `updated_at`.
    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn has_succeeded_payment(&mut self, order_id: OrderId) -> Result<bool>;
}

/// A unit of work spanning every repository.
///
/// Changes become visible to other transactions only after [`commit`].
/// Dropping the transaction discards them.
///
/// [`commit`]: Transaction::commit
#[async_trait]
pub trait Transaction:
    MedicineRepository
    + CartRepository
    + OrderRepository
    + PromocodeRepository
    + PaymentRepository
    + Send
    + Sized
{
    async fn commit(self) -> Result<()>;
}

/// Core trait for storage backends.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: Transaction;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// Current time at the precision of a `TIMESTAMPTZ` column.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
