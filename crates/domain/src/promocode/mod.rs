//! Promocodes: the evaluator used at checkout and the catalogue service.

pub mod evaluator;
mod service;

pub use evaluator::{Evaluation, discount_for, evaluate, is_within_window};
pub use service::{PromocodeService, PromocodeUpdate};
