//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With binary floats:                                                    │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Sales documents need exact sums across the chain:                     │
//! │    order total == Σ line totals, invoice total == Σ invoiced lines      │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 Decimal                                          │
//! │    50 × 10.00 × 1.19 = 595.00 exactly                                  │
//! │    No rounding at the item level; presentation rounds, we don't        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use sales_core::money::Money;
//! use sales_core::types::Percent;
//!
//! let price = Money::from_major(10);
//! let net = price.multiply_quantity(Decimal::from(50));
//! let tax = net.calculate_tax(Percent::from_whole(19));
//! assert_eq!((net + tax).amount(), Decimal::from(595));
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::Percent;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the document currency.
///
/// ## Design Decisions
/// - **Decimal**: exact base-10 arithmetic, scale kept as computed
/// - **Single field tuple struct**: zero-cost abstraction over `Decimal`
/// - **Transparent serde**: stored payloads keep the full precision
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  LineItem.unit_price ──► LineAmounts { net, tax, total }                │
/// │                                │                                        │
/// │                                ▼                                        │
/// │  DocumentTotals { subtotal, tax, total } ──► Invoice.paid_amount        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a Money value from a decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ## Example
    /// ```rust
    /// use sales_core::money::Money;
    ///
    /// let price = Money::from_major(10);
    /// assert_eq!(price.to_string(), "10.00");
    /// ```
    #[inline]
    pub fn from_major(major: i64) -> Self {
        Money(Decimal::from(major))
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use sales_core::money::Money;
    ///
    /// let unit_price = Money::new(Decimal::new(299, 2)); // 2.99
    /// let line = unit_price.multiply_quantity(Decimal::from(3));
    /// assert_eq!(line.amount(), Decimal::new(897, 2));
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: Decimal) -> Self {
        Money(self.0 * qty)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// `amount × (1 − discount/100)`, no rounding.
    pub fn apply_percentage_discount(&self, discount: Percent) -> Money {
        Money(self.0 * (Decimal::ONE - discount.fraction()))
    }

    /// Calculates tax on this (net) amount.
    ///
    /// `amount × rate/100`, no rounding. Rounding to currency precision is a
    /// presentation concern.
    ///
    /// ## Example
    /// ```rust
    /// use sales_core::money::Money;
    /// use sales_core::types::Percent;
    ///
    /// let net = Money::from_major(500);
    /// let tax = net.calculate_tax(Percent::from_whole(19));
    /// assert_eq!(tax, Money::from_major(95));
    /// ```
    pub fn calculate_tax(&self, rate: Percent) -> Money {
        Money(self.0 * rate.fraction())
    }

    /// Share of `whole` this amount represents, in percent (0 when whole is zero).
    pub fn percent_of(&self, whole: Money) -> Decimal {
        if whole.is_zero() {
            return Decimal::ZERO;
        }
        self.0 * Decimal::ONE_HUNDRED / whole.0
    }

    /// Lossy conversion for JSON projections.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display rounds to two places. Debug output only; the stored value is exact.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a decimal quantity.
impl Mul<Decimal> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: Decimal) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_rounds_for_humans_only() {
        let third = Money::new(dec!(10) / dec!(3));
        assert_eq!(third.to_string(), "3.33");
        // The stored value keeps full precision
        assert!(third.amount() > dec!(3.33));
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_major(10);
        let b = Money::new(dec!(5.5));

        assert_eq!((a + b).amount(), dec!(15.5));
        assert_eq!((a - b).amount(), dec!(4.5));
        assert_eq!((a * dec!(3)).amount(), dec!(30));
    }

    #[test]
    fn test_tax_calculation_is_exact() {
        // 10.00 at 8.25% = 0.825, kept unrounded
        let tax = Money::from_major(10).calculate_tax(Percent::new(dec!(8.25)));
        assert_eq!(tax.amount(), dec!(0.825));
    }

    #[test]
    fn test_percentage_discount() {
        let subtotal = Money::from_major(100);
        let discounted = subtotal.apply_percentage_discount(Percent::from_whole(10));
        assert_eq!(discounted.amount(), dec!(90));
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_major(1).is_positive());
        assert!(Money::from_major(-1).is_negative());
    }

    #[test]
    fn test_sum_of_line_totals() {
        let lines = [Money::new(dec!(595)), Money::new(dec!(357)), Money::new(dec!(0.01))];
        let total: Money = lines.iter().sum();
        assert_eq!(total.amount(), dec!(952.01));
    }

    #[test]
    fn test_percent_of() {
        let paid = Money::from_major(25);
        assert_eq!(paid.percent_of(Money::from_major(200)), dec!(12.5));
        assert_eq!(paid.percent_of(Money::zero()), dec!(0));
    }
}
