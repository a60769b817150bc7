use serde::{Deserialize, Serialize};

/// Declares an integer-backed identifier newtype.
///
/// Identifiers wrap the database `BIGINT` key so that a medicine id cannot be
/// passed where an order id is expected.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of a storefront user. Users themselves are managed elsewhere.
    UserId
);

impl UserId {
    /// Zero is never a valid user.
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

define_id!(
    /// Identifier of a medicine in the catalogue.
    MedicineId
);
define_id!(
    /// Identifier of a cart row.
    CartId
);
define_id!(
    /// Identifier of an order.
    OrderId
);
define_id!(
    /// Identifier of a promocode.
    PromocodeId
);
define_id!(
    /// Identifier of a payment ledger entry.
    PaymentId
);
