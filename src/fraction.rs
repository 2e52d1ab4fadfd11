/*
 *  Copyright (C) 2025 Michael Bachmann
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy)]
pub struct Fraction {
    num: i64,
    den: i64,
}

impl Fraction {
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "fraction denominator must not be zero");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        Self::reduce(num, den)
    }

    pub const fn integer(value: i64) -> Self {
        Self { num: value, den: 1 }
    }

    fn reduce(num: i64, den: i64) -> Self {
        if num == 0 {
            return Self { num: 0, den: 1 };
        }
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()) as i64;
        Self {
            num: num / g,
            den: den / g,
        }
    }

    pub fn num(&self) -> i64 {
        self.num
    }

    pub fn den(&self) -> i64 {
        self.den
    }

    pub fn is_positive(&self) -> bool {
        self.num > 0
    }

    /// Multiply by an integer scalar without losing precision (used for
    /// `k * framePeriod` with `k` a tick index).
    pub fn scale(&self, k: i64) -> Fraction {
        let num = self.num as i128 * k as i128;
        let den = self.den as i128;
        Fraction::reduce_i128(num, den)
    }

    fn reduce_i128(num: i128, den: i128) -> Fraction {
        if num == 0 {
            return Fraction { num: 0, den: 1 };
        }
        let g = gcd_i128(num.unsigned_abs(), den.unsigned_abs());
        let num = num / g as i128;
        let den = den / g as i128;
        Fraction {
            num: num.try_into().expect("fraction numerator overflowed i64"),
            den: den.try_into().expect("fraction denominator overflowed i64"),
        }
    }

    // Round half-away-from-zero, applied once to the accumulated quantity,
    // never incrementally.
    pub fn to_ticks_round(&self) -> i64 {
        round_half_away_from_zero(self.num as i128, self.den as i128)
    }

    pub fn to_ticks_floor(&self) -> i64 {
        self.num.div_euclid(self.den)
    }
}

fn round_half_away_from_zero(num: i128, den: i128) -> i64 {
    debug_assert!(den > 0);
    let sign = if num < 0 { -1i128 } else { 1i128 };
    let n = num.abs();
    let q = n / den;
    let r = n % den;
    let rounded = if 2 * r >= den { q + 1 } else { q };
    (sign * rounded)
        .try_into()
        .expect("rounded tick value overflowed i64")
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    if a == 0 { 1 } else { a }
}

fn gcd_i128(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    if a == 0 { 1 } else { a }
}

impl Add for Fraction {
    type Output = Fraction;

    fn add(self, rhs: Fraction) -> Fraction {
        let num = self.num as i128 * rhs.den as i128 + rhs.num as i128 * self.den as i128;
        let den = self.den as i128 * rhs.den as i128;
        Fraction::reduce_i128(num, den)
    }
}

impl Sub for Fraction {
    type Output = Fraction;

    fn sub(self, rhs: Fraction) -> Fraction {
        let num = self.num as i128 * rhs.den as i128 - rhs.num as i128 * self.den as i128;
        let den = self.den as i128 * rhs.den as i128;
        Fraction::reduce_i128(num, den)
    }
}

impl Mul for Fraction {
    type Output = Fraction;

    fn mul(self, rhs: Fraction) -> Fraction {
        let num = self.num as i128 * rhs.num as i128;
        let den = self.den as i128 * rhs.den as i128;
        Fraction::reduce_i128(num, den)
    }
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        self.num as i128 * other.den as i128 == other.num as i128 * self.den as i128
    }
}

impl Eq for Fraction {}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
