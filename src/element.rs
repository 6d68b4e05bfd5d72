use core::fmt;
use core::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 16-bit signed fixed-point number with 8 integer and 8 fractional bits (Q8.8).
///
/// This is the element type of every stream sample, kernel weight and
/// intermediate sum in the pipeline. Arithmetic wraps to the 16-bit container:
/// addition is two's-complement wrapping, and multiplication keeps the low 16
/// bits of the truncated 32-bit product. Overflow neither saturates nor traps,
/// so wrapped results are deterministic and portable.
///
/// The representable range is `[-128.0, 127.99609375]` with a resolution of
/// `1/256`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fixed(i16);

impl Fixed {
    /// Number of fractional bits.
    const FRAC_BITS: u32 = 8;

    /// The additive identity.
    pub const ZERO: Self = Self(0);

    /// The smallest representable value, `-128.0`.
    pub const MIN: Self = Self(i16::MIN);

    /// The largest representable value, `127.99609375`.
    pub const MAX: Self = Self(i16::MAX);

    /// The smallest positive increment, `1/256`.
    pub const RESOLUTION: f32 = 1.0 / (1 << Self::FRAC_BITS) as f32;

    /// Reinterprets a raw two's-complement word as a fixed-point value.
    pub const fn from_bits(bits: i16) -> Self {
        Self(bits)
    }

    /// The raw two's-complement word.
    pub const fn to_bits(self) -> i16 {
        self.0
    }

    /// Quantizes a float, truncating toward negative infinity and wrapping
    /// values outside the representable range.
    pub fn from_f32(value: f32) -> Self {
        let scaled = (value * (1 << Self::FRAC_BITS) as f32).floor();
        Self(scaled as i64 as i16)
    }

    /// The exact float this value represents.
    pub fn to_f32(self) -> f32 {
        f32::from(self.0) * Self::RESOLUTION
    }
}

impl Add for Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }
}

impl Mul for Fixed {
    type Output = Self;

    /// Full 32-bit product, truncated toward negative infinity by an
    /// arithmetic shift, then wrapped to 16 bits.
    fn mul(self, rhs: Self) -> Self {
        let product = i32::from(self.0) * i32::from(rhs.0);
        Self((product >> Self::FRAC_BITS) as i16)
    }
}

impl Neg for Fixed {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}
