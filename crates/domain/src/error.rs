//! Domain error types.

use common::{MedicineId, OrderId, OrderStatus, PaymentId, PaymentStatus, PromocodeId, UserId};
use store::StoreError;
use thiserror::Error;

/// Broad class of a [`DomainError`], used to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

/// Errors that can occur during domain operations.
///
/// Every business-rule violation is detected before the surrounding
/// transaction commits, so an error never leaves partial writes behind.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Quantity outside the range the operation accepts.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("Medicine not found: {0}")]
    MedicineNotFound(MedicineId),

    /// The medicine is still in at least one cart.
    #[error("Medicine {medicine_id} is in {carts} cart line(s)")]
    MedicineInUse { medicine_id: MedicineId, carts: i64 },

    /// Not enough units in stock to satisfy the request.
    #[error(
        "Out of stock: requested {requested} of medicine {medicine_id}, {available} available"
    )]
    OutOfStock {
        medicine_id: MedicineId,
        requested: i64,
        available: i64,
    },

    #[error("Cart not found for user {0}")]
    CartNotFound(UserId),

    #[error("Medicine {medicine_id} is not in the cart of user {user_id}")]
    CartItemNotFound {
        user_id: UserId,
        medicine_id: MedicineId,
    },

    #[error("Cart of user {0} is empty")]
    CartEmpty(UserId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order status table does not allow the move.
    #[error("Illegal transition: cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// Prices are fixed when the order is created.
    #[error("Field {field} cannot be changed after the order is created")]
    ImmutableField { field: &'static str },

    /// A promocode addressed by id does not exist.
    #[error("Promocode not found: {0}")]
    PromocodeNotFound(PromocodeId),

    /// A promocode supplied at checkout does not exist or is inactive.
    #[error("Promocode {0} does not exist or is inactive")]
    UnknownPromocode(String),

    #[error("Promocode {0} is outside its validity window")]
    PromocodeExpired(String),

    #[error("Promocode {0} has reached its usage limit")]
    PromocodeExhausted(String),

    #[error("Promocode {0} has reached its per-user usage limit")]
    PromocodeUserLimitReached(String),

    #[error("Promocode code already in use: {0}")]
    PromocodeCodeTaken(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// Moving an order to paid needs a succeeded payment.
    #[error("Order {0} has no succeeded payment")]
    PaymentRequired(OrderId),

    #[error("Payment {payment_id} is already {status}")]
    PaymentAlreadySettled {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    /// Malformed or missing input.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// An error occurred in the storage layer.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Returns the broad class of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidQuantity { .. } | DomainError::ValidationFailed(_) => {
                ErrorKind::Validation
            }
            DomainError::MedicineNotFound(_)
            | DomainError::CartNotFound(_)
            | DomainError::CartItemNotFound { .. }
            | DomainError::OrderNotFound(_)
            | DomainError::PromocodeNotFound(_)
            | DomainError::UnknownPromocode(_)
            | DomainError::PaymentNotFound(_) => ErrorKind::NotFound,
            DomainError::OutOfStock { .. }
            | DomainError::CartEmpty(_)
            | DomainError::IllegalTransition { .. }
            | DomainError::ImmutableField { .. }
            | DomainError::PromocodeExpired(_)
            | DomainError::PromocodeExhausted(_)
            | DomainError::PromocodeUserLimitReached(_)
            | DomainError::PromocodeCodeTaken(_)
            | DomainError::MedicineInUse { .. }
            | DomainError::PaymentRequired(_)
            | DomainError::PaymentAlreadySettled { .. } => ErrorKind::Conflict,
            DomainError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Returns a stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            DomainError::MedicineNotFound(_) => "MEDICINE_NOT_FOUND",
            DomainError::MedicineInUse { .. } => "MEDICINE_IN_USE",
            DomainError::OutOfStock { .. } => "OUT_OF_STOCK",
            DomainError::CartNotFound(_) => "CART_NOT_FOUND",
            DomainError::CartItemNotFound { .. } => "CART_ITEM_NOT_FOUND",
            DomainError::CartEmpty(_) => "CART_EMPTY",
            DomainError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            DomainError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            DomainError::ImmutableField { .. } => "IMMUTABLE_FIELD",
            DomainError::PromocodeNotFound(_) | DomainError::UnknownPromocode(_) => {
                "PROMOCODE_NOT_FOUND"
            }
            DomainError::PromocodeExpired(_) => "PROMOCODE_EXPIRED",
            DomainError::PromocodeExhausted(_) => "PROMOCODE_EXHAUSTED",
            DomainError::PromocodeUserLimitReached(_) => "PROMOCODE_USER_LIMIT_REACHED",
            DomainError::PromocodeCodeTaken(_) => "PROMOCODE_CODE_TAKEN",
            DomainError::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            DomainError::PaymentRequired(_) => "PAYMENT_REQUIRED",
            DomainError::PaymentAlreadySettled { .. } => "PAYMENT_ALREADY_SETTLED",
            DomainError::ValidationFailed(_) => "VALIDATION_FAILED",
            DomainError::Store(_) => "INTERNAL",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DomainError::ValidationFailed(message.into())
    }
}
