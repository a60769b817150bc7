//! Order commands.

use chrono::{DateTime, Utc};
use common::{Money, OrderStatus, Patch, UserId};
use serde::Deserialize;

/// Command to place an order from the user's cart.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The user whose cart is checked out.
    pub user_id: UserId,

    pub delivery_address: String,

    pub comment: String,

    /// Code of a promocode to apply, if any.
    pub promocode: Option<String>,

    /// Instant the promocode validity window is checked against.
    pub now: DateTime<Utc>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command evaluated at the current time.
    pub fn new(user_id: UserId, delivery_address: impl Into<String>) -> Self {
        Self {
            user_id,
            delivery_address: delivery_address.into(),
            comment: String::new(),
            promocode: None,
            now: store::now(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_promocode(mut self, code: impl Into<String>) -> Self {
        self.promocode = Some(code.into());
        self
    }

    /// Overrides the evaluation instant.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Partial update of an order.
///
/// The price fields exist only so that an attempt to change them can be
/// rejected; they are never applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderUpdate {
    #[serde(default)]
    pub delivery_address: Patch<String>,
    #[serde(default)]
    pub comment: Patch<String>,
    #[serde(default)]
    pub order_status: Patch<OrderStatus>,
    #[serde(default)]
    pub total_price: Patch<Money>,
    #[serde(default)]
    pub discount_total: Patch<Money>,
    #[serde(default)]
    pub final_price: Patch<Money>,
}

impl OrderUpdate {
    /// Returns the first immutable field present in the update.
    pub fn immutable_field(&self) -> Option<&'static str> {
        [
            ("total_price", self.total_price.is_present()),
            ("discount_total", self.discount_total.is_present()),
            ("final_price", self.final_price.is_present()),
        ]
        .into_iter()
        .find_map(|(name, present)| present.then_some(name))
    }
}
