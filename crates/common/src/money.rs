//! Money in integer minor currency units.

use serde::{Deserialize, Serialize};

/// An amount of money in minor units (e.g. 1000 = 10.00).
///
/// Line totals and discounts are computed on integers so repeated
/// recomputation never drifts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the major-unit portion (whole number).
    pub fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor-unit remainder after the major units.
    pub fn minor_part(&self) -> i64 {
        self.0.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity, saturating instead of overflowing.
    pub fn multiply(&self, quantity: i64) -> Money {
        Money(self.0.saturating_mul(quantity))
    }

    /// Multiplies by a quantity, or `None` if the product does not fit.
    pub fn checked_multiply(&self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    /// Adds `other`, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sums `amounts`, or `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Subtracts `other`, flooring the result at zero.
    pub fn saturating_sub_floor_zero(&self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }

    /// Clamps the amount into `[min, max]`.
    pub fn clamp(&self, min: Money, max: Money) -> Money {
        Money(self.0.clamp(min.0, max.0))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-{}.{:02}", self.major().abs(), self.minor_part())
        } else {
            write!(f, "{}.{:02}", self.major(), self.minor_part())
        }
    }
}

// Operators saturate; callers that must reject overflow use the `checked_*`
// methods.
impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_minor() {
        let money = Money::from_minor(1234);
        assert_eq!(money.minor(), 1234);
        assert_eq!(money.major(), 12);
        assert_eq!(money.minor_part(), 34);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_minor(1234).to_string(), "12.34");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(300);

        assert_eq!((a + b).minor(), 1300);
        assert_eq!((a - b).minor(), 700);
        assert_eq!(a.multiply(3).minor(), 3000);
    }

    #[test]
    fn test_operators_saturate_at_the_bounds() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!(max + Money::from_minor(1), max);
        assert_eq!(
            Money::from_minor(i64::MIN) - Money::from_minor(1),
            Money::from_minor(i64::MIN)
        );

        let mut total = Money::from_minor(i64::MAX - 1);
        total += Money::from_minor(5);
        assert_eq!(total, max);

        let summed: Money = [max, Money::from_minor(1)].into_iter().sum();
        assert_eq!(summed, max);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let half = Money::from_minor(i64::MAX / 2);
        assert_eq!(half.checked_multiply(3), None);
        assert_eq!(half.checked_multiply(2), Some(Money::from_minor(i64::MAX - 1)));
        assert_eq!(half.checked_add(half), Some(Money::from_minor(i64::MAX - 1)));
        assert_eq!(
            Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)),
            None
        );

        let lines = [Money::from_minor(i64::MAX - 1), Money::from_minor(1)];
        assert_eq!(Money::checked_sum(lines), Some(Money::from_minor(i64::MAX)));
        let lines = [Money::from_minor(i64::MAX - 1), Money::from_minor(2)];
        assert_eq!(Money::checked_sum(lines), None);
    }

    #[test]
    fn test_subtraction_floors_at_zero() {
        let total = Money::from_minor(500);
        assert_eq!(total.saturating_sub_floor_zero(Money::from_minor(800)), Money::zero());
        assert_eq!(
            Money::from_minor(i64::MIN).saturating_sub_floor_zero(Money::from_minor(1)),
            Money::zero()
        );
        assert_eq!(
            total.saturating_sub_floor_zero(Money::from_minor(200)),
            Money::from_minor(300)
        );
    }

    #[test]
    fn test_sum_of_line_totals() {
        let lines = [Money::from_minor(2000), Money::from_minor(450)];
        let total: Money = lines.into_iter().sum();
        assert_eq!(total.minor(), 2450);
    }

    #[test]
    fn test_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Money::from_minor(990)).unwrap(), "990");
    }
}
