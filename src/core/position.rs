//! Debt positions.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::math::{Rad, Ray, Wad};

/// One owner's locked collateral and debt share within one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Collateral locked in the position
    pub locked_collateral: Wad,
    /// Normalized debt; value owed is `debt_share * rate`
    pub debt_share: Wad,
}

impl Position {
    /// Create a position
    pub fn new(locked_collateral: Wad, debt_share: Wad) -> Self {
        Self {
            locked_collateral,
            debt_share,
        }
    }

    /// Debt value at an accumulated rate
    pub fn debt_value(&self, rate: Ray) -> Rad {
        self.debt_share.mul_ray(rate)
    }

    /// Collateral value at a safety-margin price
    pub fn collateral_value(&self, price_with_safety_margin: Ray) -> Rad {
        self.locked_collateral.mul_ray(price_with_safety_margin)
    }

    /// `locked * spot >= debt * rate`
    pub fn is_safe(&self, rate: Ray, price_with_safety_margin: Ray) -> bool {
        self.collateral_value(price_with_safety_margin) >= self.debt_value(rate)
    }

    /// Debt value is zero or at least the floor
    pub fn respects_floor(&self, rate: Ray, debt_floor: Rad) -> bool {
        self.debt_share.is_zero() || self.debt_value(rate) >= debt_floor
    }

    /// Both fields are zero
    pub fn is_empty(&self) -> bool {
        self.locked_collateral.is_zero() && self.debt_share.is_zero()
    }

    /// Apply signed raw deltas
    pub fn adjusted(&self, collateral_delta: i128, debt_share_delta: i128) -> Result<Self> {
        Ok(Self {
            locked_collateral: self.locked_collateral.checked_add_signed(collateral_delta)?,
            debt_share: self.debt_share.checked_add_signed(debt_share_delta)?,
        })
    }
}
