//! Input validation utilities.
//!
//! Guards shared by the ledger, the liquidation strategy and the settlement
//! engine. They run before any state is touched.

use crate::core::types::Address;
use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, MAX_CAGE_COOLDOWN_SECS, MIN_CAGE_COOLDOWN_SECS};
use crate::utils::math::{Rad, Ray, Wad};

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that a Unit amount is non-zero
pub fn validate_non_zero_wad(amount: Wad) -> Result<()> {
    if amount.is_zero() {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

/// Validate that a Value amount is non-zero
pub fn validate_non_zero_rad(amount: Rad) -> Result<()> {
    if amount.is_zero() {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an address is not the zero address
pub fn validate_address(address: &Address, name: &str) -> Result<()> {
    if address.is_zero() {
        return Err(Error::ZeroAddress(name.into()));
    }
    Ok(())
}

/// Validate a transfer endpoint pair
pub fn validate_transfer(src: &Address, dst: &Address) -> Result<()> {
    if src == dst {
        return Err(Error::SameAddress);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a basis-point value within `[min, max]`
pub fn validate_bps(value: u32, min: u32, max: u32, name: &str) -> Result<()> {
    if value < min || value > max {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} bps outside [{}, {}]", value, min, max),
        });
    }
    Ok(())
}

/// Close factor must be in `(0, 10000]`
pub fn validate_close_factor(bps: u32) -> Result<()> {
    validate_bps(bps, 1, BPS_DIVISOR, "close_factor_bps")
}

/// Liquidator incentive must be at least 100%
pub fn validate_liquidator_incentive(bps: u32) -> Result<()> {
    validate_bps(bps, BPS_DIVISOR, u32::MAX, "liquidator_incentive_bps")
}

/// Treasury share of the bonus must not exceed 100%
pub fn validate_treasury_fees(bps: u32) -> Result<()> {
    validate_bps(bps, 0, BPS_DIVISOR, "treasury_fees_bps")
}

/// Liquidation ratio must be at least 1.0
pub fn validate_liquidation_ratio(ratio: Ray) -> Result<()> {
    if ratio < Ray::ONE {
        return Err(Error::InvalidParameter {
            name: "liquidation_ratio".into(),
            reason: format!("{} is below 1.0", ratio),
        });
    }
    Ok(())
}

/// Settlement cooldown must lie within the allowed window
pub fn validate_cooldown(seconds: u64) -> Result<()> {
    if !(MIN_CAGE_COOLDOWN_SECS..=MAX_CAGE_COOLDOWN_SECS).contains(&seconds) {
        return Err(Error::InvalidCooldown {
            got: seconds,
            min: MIN_CAGE_COOLDOWN_SECS,
            max: MAX_CAGE_COOLDOWN_SECS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::WEEK_SECS;

    #[test]
    fn test_zero_amounts() {
        assert!(matches!(validate_non_zero_wad(Wad::ZERO), Err(Error::ZeroAmount)));
        assert!(validate_non_zero_wad(Wad::ONE).is_ok());
        assert!(matches!(validate_non_zero_rad(Rad::ZERO), Err(Error::ZeroAmount)));
    }

    #[test]
    fn test_transfer_guards() {
        let a = Address::derive("a");
        assert!(matches!(validate_transfer(&a, &a), Err(Error::SameAddress)));
        assert!(validate_transfer(&a, &Address::derive("b")).is_ok());
        assert!(matches!(
            validate_address(&Address::ZERO, "to"),
            Err(Error::ZeroAddress(_))
        ));
    }

    #[test]
    fn test_liquidation_parameters() {
        assert!(validate_close_factor(0).is_err());
        assert!(validate_close_factor(10_000).is_ok());
        assert!(validate_close_factor(10_001).is_err());
        assert!(validate_liquidator_incentive(9_999).is_err());
        assert!(validate_liquidator_incentive(10_250).is_ok());
        assert!(validate_treasury_fees(10_001).is_err());
        assert!(validate_liquidation_ratio(Ray::from_bps(9_000)).is_err());
        assert!(validate_liquidation_ratio(Ray::from_bps(13_300)).is_ok());
    }

    #[test]
    fn test_cooldown_window() {
        assert!(validate_cooldown(WEEK_SECS - 1).is_err());
        assert!(validate_cooldown(WEEK_SECS).is_ok());
        assert!(validate_cooldown(13 * WEEK_SECS).is_ok());
        assert!(matches!(
            validate_cooldown(14 * WEEK_SECS),
            Err(Error::InvalidCooldown { .. })
        ));
    }
}
