//! Shared vocabulary for the pharmacy storefront.
//!
//! Identifiers, money in minor currency units, the order and payment status
//! enums, and the [`Patch`] type used by partial-update requests.

pub mod money;
pub mod patch;
pub mod status;
pub mod types;

pub use money::Money;
pub use patch::Patch;
pub use status::{DiscountType, OrderStatus, ParseEnumError, PaymentMethod, PaymentStatus};
pub use types::{CartId, MedicineId, OrderId, PaymentId, PromocodeId, UserId};
