//! Orders placed from carts and their status lifecycle.

mod commands;
mod service;

pub use commands::{CreateOrder, OrderUpdate};
pub use service::OrderService;

pub(crate) use service::apply_transition;
