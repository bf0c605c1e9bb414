//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT SCALES
// ═══════════════════════════════════════════════════════════════════════════════

/// Unit scale (WAD): token amounts, collateral amounts, per-unit prices
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Rate scale (RAY): accumulated rates, ratios, safety-margin prices
pub const RAY: u128 = 1_000_000_000_000_000_000_000_000_000;

/// Factor between RAY and WAD (10^9)
pub const WAD_TO_RAY: u128 = 1_000_000_000;

/// Decimal places of the Unit scale
pub const WAD_DECIMALS: u32 = 18;

/// Decimal places of the Rate scale
pub const RAY_DECIMALS: u32 = 27;

/// Decimal places of the Value scale (RAD = WAD * RAY)
pub const RAD_DECIMALS: u32 = 45;

// ═══════════════════════════════════════════════════════════════════════════════
// BASIS POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u32 = 10_000;

/// Default close factor - 50% of a position per liquidation call
pub const DEFAULT_CLOSE_FACTOR_BPS: u32 = 5_000;

/// Default liquidator incentive - 105% of the repaid debt in collateral
pub const DEFAULT_LIQUIDATOR_INCENTIVE_BPS: u32 = 10_500;

/// Default treasury share of the liquidation bonus - 25%
pub const DEFAULT_TREASURY_FEES_BPS: u32 = 2_500;

// ═══════════════════════════════════════════════════════════════════════════════
// SETTLEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// One week in seconds
pub const WEEK_SECS: u64 = 7 * 24 * 3600;

/// Shortest allowed settlement cooldown - 1 week
pub const MIN_CAGE_COOLDOWN_SECS: u64 = WEEK_SECS;

/// Longest allowed settlement cooldown - 13 weeks (~3 months)
pub const MAX_CAGE_COOLDOWN_SECS: u64 = 13 * WEEK_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Default lower bound of the stablecoin reference price - 0.9 RAY
pub const DEFAULT_REFERENCE_PRICE_MIN: u128 = RAY / 10 * 9;

/// Default upper bound of the stablecoin reference price - 2.0 RAY
pub const DEFAULT_REFERENCE_PRICE_MAX: u128 = 2 * RAY;

/// Maximum number of events kept by the liquidation strategy history
pub const MAX_LIQUIDATION_HISTORY: usize = 1_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales() {
        assert_eq!(WAD * WAD_TO_RAY, RAY);
        assert_eq!(10u128.pow(WAD_DECIMALS), WAD);
        assert_eq!(10u128.pow(RAY_DECIMALS), RAY);
        assert_eq!(RAD_DECIMALS, WAD_DECIMALS + RAY_DECIMALS);
    }

    #[test]
    fn test_liquidation_defaults() {
        assert!(DEFAULT_CLOSE_FACTOR_BPS <= BPS_DIVISOR);
        assert!(DEFAULT_LIQUIDATOR_INCENTIVE_BPS >= BPS_DIVISOR);
        assert!(DEFAULT_TREASURY_FEES_BPS <= BPS_DIVISOR);
    }

    #[test]
    fn test_reference_band() {
        assert!(DEFAULT_REFERENCE_PRICE_MIN < RAY);
        assert!(RAY < DEFAULT_REFERENCE_PRICE_MAX);
        assert!(MIN_CAGE_COOLDOWN_SECS < MAX_CAGE_COOLDOWN_SECS);
    }
}
