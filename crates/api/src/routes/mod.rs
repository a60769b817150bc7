//! HTTP route handlers and the state they share.

pub mod carts;
pub mod health;
pub mod medicines;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod promocodes;

use domain::{CartService, MedicineService, OrderService, PaymentService, PromocodeService};
use store::Store;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub medicines: MedicineService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub payments: PaymentService<S>,
    pub promocodes: PromocodeService<S>,
}

impl<S: Store + Clone> AppState<S> {
    /// Builds every service over the same store.
    pub fn new(store: S) -> Self {
        Self {
            medicines: MedicineService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(store.clone()),
            promocodes: PromocodeService::new(store),
        }
    }
}

/// Parses a numeric path segment into a typed id.
pub(crate) fn parse_id<T: From<i64>>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse::<i64>()
        .map(T::from)
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    #[test]
    fn test_parse_id() {
        let id: OrderId = parse_id("42", "order").unwrap();
        assert_eq!(id, OrderId::new(42));
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id::<OrderId>("abc", "order").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
