//! Promocode Evaluator.
//!
//! Checks, in order, first failure wins:
//! 1. the code exists and is active
//! 2. `now` is inside `[valid_from, valid_to]`
//! 3. total redemptions are below `max_uses`
//! 4. the user's redemptions are below `max_uses_per_user`

use chrono::{DateTime, Utc};
use common::{DiscountType, Money, UserId};
use store::{Promocode, PromocodeRepository};

use crate::error::DomainError;

/// A promocode that passed every check, with the discount it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub promocode: Promocode,
    pub discount: Money,
}

/// Returns true if `now` falls inside the inclusive validity window.
pub fn is_within_window(promocode: &Promocode, now: DateTime<Utc>) -> bool {
    promocode.valid_from <= now && now <= promocode.valid_to
}

/// Computes the discount for `order_total`, clamped to `[0, order_total]`.
pub fn discount_for(promocode: &Promocode, order_total: Money) -> Money {
    let raw = match promocode.discount_type {
        DiscountType::Fixed => Money::from_minor(promocode.discount_value),
        DiscountType::Percent => {
            let amount =
                i128::from(order_total.minor()) * i128::from(promocode.discount_value) / 100;
            Money::from_minor(i64::try_from(amount).unwrap_or(i64::MAX))
        }
    };
    raw.clamp(Money::zero(), order_total.max(Money::zero()))
}

/// Runs every check against `code` inside the caller's transaction.
///
/// The promocode row is locked so the usage counts stay valid until the
/// caller records its redemption and commits.
pub async fn evaluate<T>(
    tx: &mut T,
    code: &str,
    order_total: Money,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Evaluation, DomainError>
where
    T: PromocodeRepository + ?Sized,
{
    let promocode = match tx.lock_promocode_by_code(code).await? {
        Some(p) if p.is_active => p,
        _ => return Err(DomainError::UnknownPromocode(code.to_string())),
    };

    if !is_within_window(&promocode, now) {
        return Err(DomainError::PromocodeExpired(promocode.code));
    }

    if let Some(max_uses) = promocode.max_uses
        && tx.count_redemptions(promocode.id).await? >= max_uses
    {
        return Err(DomainError::PromocodeExhausted(promocode.code));
    }

    if let Some(max_per_user) = promocode.max_uses_per_user
        && tx.count_user_redemptions(promocode.id, user_id).await? >= max_per_user
    {
        return Err(DomainError::PromocodeUserLimitReached(promocode.code));
    }

    let discount = discount_for(&promocode, order_total);
    Ok(Evaluation {
        promocode,
        discount,
    })
}
