//! Domain layer for the pharmacy storefront.
//!
//! This crate provides the core services:
//! - CartService: add, update and remove cart lines against live stock
//! - PromocodeService and the promocode evaluator
//! - OrderService: checkout from a cart and the order status lifecycle
//! - PaymentService: the payment ledger driving paid transitions
//! - MedicineService: the catalogue the other services read from
//!
//! Services depend only on the [`store::Store`] traits and run every
//! operation in a single store transaction.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod order;
pub mod payment;
pub mod promocode;

pub use cart::CartService;
pub use catalog::{MedicineService, MedicineUpdate};
pub use error::{DomainError, ErrorKind};
pub use order::{CreateOrder, OrderService, OrderUpdate};
pub use payment::{PaymentService, RecordPayment};
pub use promocode::{Evaluation, PromocodeService, PromocodeUpdate};
