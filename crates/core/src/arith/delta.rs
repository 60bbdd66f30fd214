use std::{
    cmp::Ordering,
    fmt::Display,
    ops::{Add, Neg, Sub},
};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

/// A number of the form `real + delta * δ`, where `δ` is a positive infinitesimal. Strict bounds
/// over the reals are expressed as non-strict bounds on these numbers: `x < c` becomes
/// `x <= c - δ`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DeltaRational {
    pub real: BigRational,
    pub delta: BigRational,
}

impl DeltaRational {
    pub fn new(real: BigRational, delta: BigRational) -> Self {
        DeltaRational { real, delta }
    }

    /// The infinitesimal `δ` itself.
    pub fn delta() -> Self {
        DeltaRational::new(BigRational::zero(), BigRational::one())
    }

    pub fn scale(&self, factor: &BigRational) -> Self {
        DeltaRational::new(&self.real * factor, &self.delta * factor)
    }

    pub fn is_integral(&self) -> bool {
        self.delta.is_zero() && self.real.is_integer()
    }

    /// The largest integer that is at most this value.
    pub fn floor(&self) -> BigInt {
        if self.real.is_integer() {
            if self.delta < BigRational::zero() {
                self.real.to_integer() - 1
            } else {
                self.real.to_integer()
            }
        } else {
            self.real.floor().to_integer()
        }
    }
}

impl From<BigRational> for DeltaRational {
    fn from(real: BigRational) -> Self {
        DeltaRational::new(real, BigRational::zero())
    }
}

impl From<BigInt> for DeltaRational {
    fn from(value: BigInt) -> Self {
        DeltaRational::from(BigRational::from_integer(value))
    }
}

impl From<i64> for DeltaRational {
    fn from(value: i64) -> Self {
        DeltaRational::from(BigInt::from(value))
    }
}

impl Ord for DeltaRational {
    fn cmp(&self, other: &Self) -> Ordering {
        self.real
            .cmp(&other.real)
            .then_with(|| self.delta.cmp(&other.delta))
    }
}

impl PartialOrd for DeltaRational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for &DeltaRational {
    type Output = DeltaRational;

    fn add(self, rhs: Self) -> Self::Output {
        DeltaRational::new(&self.real + &rhs.real, &self.delta + &rhs.delta)
    }
}

impl Sub for &DeltaRational {
    type Output = DeltaRational;

    fn sub(self, rhs: Self) -> Self::Output {
        DeltaRational::new(&self.real - &rhs.real, &self.delta - &rhs.delta)
    }
}

impl Neg for &DeltaRational {
    type Output = DeltaRational;

    fn neg(self) -> Self::Output {
        DeltaRational::new(-&self.real, -&self.delta)
    }
}

impl Display for DeltaRational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.delta.is_zero() {
            write!(f, "{}", self.real)
        } else {
            write!(f, "{} + {}δ", self.real, self.delta)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rational(numer: i64, denom: i64) -> BigRational {
        BigRational::new(numer.into(), denom.into())
    }

    #[test]
    fn infinitesimal_orders_after_the_real_part() {
        let three = DeltaRational::from(3);
        let just_below_three = &three - &DeltaRational::delta();

        assert!(just_below_three < three);
        assert!(DeltaRational::from(2) < just_below_three);
    }

    #[test]
    fn floor_respects_the_infinitesimal() {
        let three = DeltaRational::from(3);

        assert_eq!(BigInt::from(3), three.floor());
        assert_eq!(BigInt::from(2), (&three - &DeltaRational::delta()).floor());
        assert_eq!(BigInt::from(3), (&three + &DeltaRational::delta()).floor());
        assert_eq!(
            BigInt::from(-2),
            DeltaRational::from(rational(-3, 2)).floor()
        );
    }

    #[test]
    fn only_standard_integers_are_integral() {
        assert!(DeltaRational::from(4).is_integral());
        assert!(!DeltaRational::from(rational(1, 2)).is_integral());
        assert!(!(&DeltaRational::from(4) + &DeltaRational::delta()).is_integral());
    }

    #[test]
    fn scaling_applies_to_both_parts() {
        let value = DeltaRational::new(rational(1, 2), rational(-1, 1));
        let scaled = value.scale(&rational(-2, 1));

        assert_eq!(DeltaRational::new(rational(-1, 1), rational(2, 1)), scaled);
    }
}
