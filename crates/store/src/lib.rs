//! Storage layer for the pharmacy storefront.
//!
//! Each entity has a repository trait. A [`Store`] hands out
//! [`Transaction`]s that implement all of them, so a service can read, check
//! and write several entities as one atomic unit. Dropping a transaction
//! without committing rolls it back.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use models::{
    Cart, CartItem, Medicine, NewMedicine, NewOrder, NewPayment, NewPromocode, Order, OrderLine,
    Payment, Promocode,
};
pub use postgres::{PgStore, PgTransaction};
pub use store::{
    CartRepository, MedicineRepository, OrderRepository, PaymentRepository, PromocodeRepository,
    Store, Transaction, now,
};
