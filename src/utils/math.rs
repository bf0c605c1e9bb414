//! Fixed-point arithmetic for the three protocol scales.
//!
//! - [`Wad`]: Unit scale (10^18) for token and collateral amounts and per-unit prices
//! - [`Ray`]: Rate scale (10^27) for accumulated rates, ratios and safety-margin prices
//! - [`Rad`]: Value scale (10^45) for stablecoin value, `Wad * Ray`
//!
//! The scales never mix implicitly: every conversion is a named method. All
//! arithmetic is checked and fails with [`Error::Overflow`] / [`Error::Underflow`]
//! instead of wrapping. Division always rounds down.

use primitive_types::{U256, U512};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, RAD_DECIMALS, RAY, RAY_DECIMALS, WAD, WAD_DECIMALS, WAD_TO_RAY};

fn overflow(operation: &str) -> Error {
    Error::Overflow {
        operation: operation.into(),
    }
}

fn underflow(operation: &str) -> Error {
    Error::Underflow {
        operation: operation.into(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIDE INTEGER HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn widen(value: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(&value.0);
    U512(limbs)
}

fn narrow(value: U512) -> Option<U256> {
    if value.bits() > 256 {
        return None;
    }
    Some(U256([value.0[0], value.0[1], value.0[2], value.0[3]]))
}

fn to_u128(value: U256) -> Option<u128> {
    if value.bits() > 128 {
        return None;
    }
    Some(value.low_u128())
}

/// Computes `floor(a * b / c)` with a 512-bit intermediate.
///
/// Returns `None` on division by zero or when the quotient does not fit 256 bits.
pub fn mul_div(a: U256, b: U256, c: U256) -> Option<U256> {
    if c.is_zero() {
        return None;
    }
    narrow(a.full_mul(b) / widen(c))
}

/// `10^exp` as a 256-bit integer
pub fn pow10(exp: u32) -> U256 {
    U256::from(10u8).pow(U256::from(exp))
}

fn rad_scale() -> U256 {
    pow10(RAD_DECIMALS)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Scale a non-negative decimal to an integer with `decimals` places, rounding down.
fn scale_decimal(value: Decimal, decimals: u32, name: &str) -> Result<U256> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} must not be negative", value),
        });
    }
    let mantissa = U256::from(value.mantissa().unsigned_abs());
    let scale = value.scale();
    if scale <= decimals {
        mantissa
            .checked_mul(pow10(decimals - scale))
            .ok_or_else(|| overflow(name))
    } else {
        Ok(mantissa / pow10(scale - decimals))
    }
}

fn format_scaled(value: U256, decimals: u32) -> String {
    let scale = pow10(decimals);
    let integer = value / scale;
    let fraction = value % scale;
    if fraction.is_zero() {
        return integer.to_string();
    }
    let digits = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", integer, digits.trim_end_matches('0'))
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Unit-scaled amount (10^18)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Wad(u128);

impl Wad {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// One whole unit
    pub const ONE: Self = Self(WAD);

    /// Create from the raw scaled integer
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole units
    pub const fn from_units(units: u64) -> Self {
        Self(units as u128 * WAD)
    }

    /// Parse from a decimal amount, e.g. `"1.5"`
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        let raw = scale_decimal(value, WAD_DECIMALS, "wad")?;
        to_u128(raw).map(Self).ok_or_else(|| overflow("wad from decimal"))
    }

    /// Raw scaled integer
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0.checked_add(other.0).map(Self).ok_or_else(|| overflow("wad add"))
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0.checked_sub(other.0).map(Self).ok_or_else(|| underflow("wad sub"))
    }

    /// Apply a signed delta
    pub fn checked_add_signed(self, delta: i128) -> Result<Self> {
        if delta >= 0 {
            self.checked_add(Self(delta.unsigned_abs()))
        } else {
            self.checked_sub(Self(delta.unsigned_abs()))
        }
    }

    /// Signed representation, `None` if the amount exceeds `i128::MAX`
    pub fn to_signed(self) -> Option<i128> {
        i128::try_from(self.0).ok()
    }

    /// Exact product with a rate: `Wad * Ray = Rad`
    pub fn mul_ray(self, rate: Ray) -> Rad {
        Rad(U256::from(self.0) * U256::from(rate.0))
    }

    /// Multiply by basis points, rounding down
    pub fn mul_bps(self, bps: u32) -> Result<Self> {
        let scaled = U256::from(self.0) * U256::from(bps) / U256::from(BPS_DIVISOR);
        to_u128(scaled).map(Self).ok_or_else(|| overflow("wad mul bps"))
    }

    /// Widen to a stablecoin value: `Wad * 10^27`
    pub fn to_rad(self) -> Rad {
        Rad(U256::from(self.0) * U256::from(RAY))
    }

    /// Lossless decimal, `None` beyond the 96-bit `Decimal` mantissa
    pub fn to_decimal(self) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(self.to_signed()?, WAD_DECIMALS).ok()
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_scaled(U256::from(self.0), WAD_DECIMALS))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAY
// ═══════════════════════════════════════════════════════════════════════════════

/// Rate-scaled value (10^27)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Ray(u128);

impl Ray {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// 1.0
    pub const ONE: Self = Self(RAY);

    /// Create from the raw scaled integer
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from basis points, e.g. 13_300 bps = 1.33
    pub const fn from_bps(bps: u32) -> Self {
        Self(bps as u128 * (RAY / BPS_DIVISOR as u128))
    }

    /// Widen a Unit-scaled price to Rate scale
    pub fn from_wad(value: Wad) -> Result<Self> {
        value
            .0
            .checked_mul(WAD_TO_RAY)
            .map(Self)
            .ok_or_else(|| overflow("wad to ray"))
    }

    /// Parse from a decimal ratio, e.g. `"1.33"`
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        let raw = scale_decimal(value, RAY_DECIMALS, "ray")?;
        to_u128(raw).map(Self).ok_or_else(|| overflow("ray from decimal"))
    }

    /// Raw scaled integer
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0.checked_add(other.0).map(Self).ok_or_else(|| overflow("ray add"))
    }

    /// `self * other / RAY`, rounding down
    pub fn rmul(self, other: Self) -> Result<Self> {
        let product = mul_div(U256::from(self.0), U256::from(other.0), U256::from(RAY))
            .ok_or_else(|| overflow("ray mul"))?;
        to_u128(product).map(Self).ok_or_else(|| overflow("ray mul"))
    }

    /// `self * RAY / other`, rounding down
    pub fn rdiv(self, other: Self) -> Result<Self> {
        if other.is_zero() {
            return Err(Error::InvalidParameter {
                name: "divisor".into(),
                reason: "division by zero".into(),
            });
        }
        let quotient = mul_div(U256::from(self.0), U256::from(RAY), U256::from(other.0))
            .ok_or_else(|| overflow("ray div"))?;
        to_u128(quotient).map(Self).ok_or_else(|| overflow("ray div"))
    }

    /// Apply this rate to a Unit amount, rounding down: `amount * self / RAY`
    pub fn apply(self, amount: Wad) -> Result<Wad> {
        let product = mul_div(U256::from(amount.0), U256::from(self.0), U256::from(RAY))
            .ok_or_else(|| overflow("ray apply"))?;
        to_u128(product).map(Wad).ok_or_else(|| overflow("ray apply"))
    }
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_scaled(U256::from(self.0), RAY_DECIMALS))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Value-scaled stablecoin amount (10^45)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Rad(U256);

impl Rad {
    /// Zero
    pub const ZERO: Self = Self(U256([0; 4]));

    /// Create from the raw scaled integer
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Create from whole stablecoin units
    pub fn from_units(units: u64) -> Self {
        Self(U256::from(units) * rad_scale())
    }

    /// Parse from a decimal amount
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        scale_decimal(value, RAD_DECIMALS, "rad").map(Self)
    }

    /// Raw scaled integer
    pub fn raw(&self) -> U256 {
        self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0.checked_add(other.0).map(Self).ok_or_else(|| overflow("rad add"))
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0.checked_sub(other.0).map(Self).ok_or_else(|| underflow("rad sub"))
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Add or subtract a magnitude depending on `negative`
    pub fn checked_apply(self, magnitude: Self, negative: bool) -> Result<Self> {
        if negative {
            self.checked_sub(magnitude)
        } else {
            self.checked_add(magnitude)
        }
    }

    /// Divide by a rate, rounding down: `Rad / Ray = Wad`
    pub fn div_ray(self, rate: Ray) -> Result<Wad> {
        if rate.is_zero() {
            return Err(Error::InvalidParameter {
                name: "rate".into(),
                reason: "division by zero".into(),
            });
        }
        let quotient = self.0 / U256::from(rate.0);
        to_u128(quotient).map(Wad).ok_or_else(|| overflow("rad div ray"))
    }

    /// Multiply by a rate and divide by `RAY * RAY`: `Rad * Ray -> Wad`, rounding down.
    ///
    /// Used to price a stablecoin value in collateral at a Rate-scaled
    /// collateral-per-stablecoin price.
    pub fn mul_ray_to_wad(self, rate: Ray) -> Result<Wad> {
        let divisor = U256::from(RAY) * U256::from(RAY);
        let quotient = mul_div(self.0, U256::from(rate.0), divisor)
            .ok_or_else(|| overflow("rad mul ray"))?;
        to_u128(quotient).map(Wad).ok_or_else(|| overflow("rad mul ray"))
    }

    /// Multiply by basis points, rounding down
    pub fn mul_bps(self, bps: u32) -> Result<Self> {
        mul_div(self.0, U256::from(bps), U256::from(BPS_DIVISOR))
            .map(Self)
            .ok_or_else(|| overflow("rad mul bps"))
    }

    /// Minimum of two values
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for Rad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_scaled(self.0, RAD_DECIMALS))
    }
}
