//! Persisted records.

use chrono::{DateTime, Utc};
use common::{
    CartId, DiscountType, MedicineId, Money, OrderId, OrderStatus, PaymentId, PaymentMethod,
    PaymentStatus, PromocodeId, UserId,
};
use serde::{Deserialize, Serialize};

/// A medicine and its stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: MedicineId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i64,
    /// Always `stock_quantity > 0`; kept as a column for catalogue queries.
    pub in_stock: bool,
    pub manufacturer: String,
    pub prescription_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Re-derives `in_stock` from the stock level.
    pub fn refresh_in_stock(&mut self) {
        self.in_stock = self.stock_quantity > 0;
    }
}

/// Fields of a medicine to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock_quantity: i64,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub prescription_required: bool,
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub medicine_id: MedicineId,
    /// Medicine name when the line was first added.
    pub name: String,
    pub quantity: i64,
    /// Unit price snapshot, refreshed on every change to the line.
    pub price_per_unit: Money,
    pub line_total: Money,
}

impl CartItem {
    /// Creates a line for `quantity` units of `medicine` at its current price.
    pub fn for_medicine(medicine: &Medicine, quantity: i64) -> Self {
        Self {
            medicine_id: medicine.id,
            name: medicine.name.clone(),
            quantity,
            price_per_unit: medicine.price,
            line_total: medicine.price.multiply(quantity),
        }
    }

    /// Sets quantity and unit price, recomputing the line total.
    pub fn reprice(&mut self, quantity: i64, price_per_unit: Money) {
        self.quantity = quantity;
        self.price_per_unit = price_per_unit;
        self.line_total = price_per_unit.multiply(quantity);
    }
}

/// A user's cart. At most one line per medicine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn item(&self, medicine_id: MedicineId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.medicine_id == medicine_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Recomputes `total_price` from the current line totals and returns it.
    /// Saturates at the largest amount.
    pub fn recompute_total(&mut self) -> Money {
        self.total_price = self.items.iter().map(|i| i.line_total).sum();
        self.total_price
    }

    /// Sum of the line totals, or `None` if it does not fit in [`Money`].
    pub fn checked_total(&self) -> Option<Money> {
        Money::checked_sum(self.items.iter().map(|i| i.line_total))
    }
}

/// A cart line frozen into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub medicine_id: MedicineId,
    pub name: String,
    pub quantity: i64,
    pub price_per_unit: Money,
    pub line_total: Money,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            medicine_id: item.medicine_id,
            name: item.name.clone(),
            quantity: item.quantity,
            price_per_unit: item.price_per_unit,
            line_total: item.line_total,
        }
    }
}

/// An order placed from a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_status: OrderStatus,
    pub total_price: Money,
    pub discount_total: Money,
    pub final_price: Money,
    pub delivery_address: String,
    pub comment: String,
    /// Code of the promocode applied at creation, if any.
    pub promocode: Option<String>,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of an order to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_status: OrderStatus,
    pub total_price: Money,
    pub discount_total: Money,
    pub final_price: Money,
    pub delivery_address: String,
    pub comment: String,
    pub promocode: Option<String>,
    pub lines: Vec<OrderLine>,
}

/// A discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promocode {
    pub id: PromocodeId,
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    /// Minor units for fixed codes, whole percent for percent codes.
    pub discount_value: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub max_uses: Option<i64>,
    pub max_uses_per_user: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a promocode to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPromocode {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub max_uses_per_user: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A payment ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a payment to insert. New payments are always pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
}
