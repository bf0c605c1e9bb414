//! Collateral pool parameters.
//!
//! A pool is created once through [`crate::ledger::Ledger::initialize_pool`] and
//! never destroyed. Its accumulated rate only grows; its safety-margin price
//! is written by the price oracle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::adapter::CollateralAdapter;
use crate::core::types::{Address, PoolId};
use crate::error::Result;
use crate::oracle::price_feed::PriceFeed;
use crate::utils::constants::{
    DEFAULT_CLOSE_FACTOR_BPS, DEFAULT_LIQUIDATOR_INCENTIVE_BPS, DEFAULT_TREASURY_FEES_BPS,
};
use crate::utils::math::{Rad, Ray, Wad};
use crate::utils::validation::{
    validate_close_factor, validate_liquidation_ratio, validate_liquidator_incentive,
    validate_treasury_fees,
};

// ═══════════════════════════════════════════════════════════════════════════════
// POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-pool state and configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Pool identifier
    pub id: PoolId,
    /// Accumulated stability-fee rate, starts at 1.0
    pub debt_accumulated_rate: Ray,
    /// Sum of all position debt shares
    pub total_debt_share: Wad,
    /// Maximum pool debt value
    pub debt_ceiling: Rad,
    /// Minimum non-zero position debt value
    pub debt_floor: Rad,
    /// Maximum debt value of a single position
    pub position_debt_ceiling: Rad,
    /// Collateral price discounted by the liquidation ratio
    pub price_with_safety_margin: Ray,
    /// Required over-collateralization ratio
    pub liquidation_ratio: Ray,
    /// Maximum share of a position liquidated per call
    pub close_factor_bps: u32,
    /// Collateral paid per unit of debt repaid, incentive included
    pub liquidator_incentive_bps: u32,
    /// Treasury share of the liquidation bonus
    pub treasury_fees_bps: u32,
    /// Liquidation strategy address for this pool
    pub strategy: Option<Address>,
    /// Collateral price source
    #[serde(skip)]
    pub price_feed: Option<Arc<dyn PriceFeed>>,
    /// Custody adapter notified on collateral movements
    #[serde(skip)]
    pub adapter: Option<Arc<dyn CollateralAdapter>>,
}

impl Pool {
    /// Build an initialized pool from its configuration
    pub fn new(id: PoolId, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id,
            debt_accumulated_rate: Ray::ONE,
            total_debt_share: Wad::ZERO,
            debt_ceiling: config.debt_ceiling,
            debt_floor: config.debt_floor,
            position_debt_ceiling: config.position_debt_ceiling,
            price_with_safety_margin: Ray::ZERO,
            liquidation_ratio: config.liquidation_ratio,
            close_factor_bps: config.close_factor_bps,
            liquidator_incentive_bps: config.liquidator_incentive_bps,
            treasury_fees_bps: config.treasury_fees_bps,
            strategy: config.strategy,
            price_feed: config.price_feed,
            adapter: config.adapter,
        })
    }

    /// Whether the pool has been initialized (`rate != 0`)
    pub fn is_initialized(&self) -> bool {
        !self.debt_accumulated_rate.is_zero()
    }

    /// Total pool debt value
    pub fn total_debt(&self) -> Rad {
        self.total_debt_share.mul_ray(self.debt_accumulated_rate)
    }

    /// Apply a governance parameter change
    pub fn apply(&mut self, parameter: PoolParameter) -> Result<()> {
        match parameter {
            PoolParameter::DebtCeiling(v) => self.debt_ceiling = v,
            PoolParameter::DebtFloor(v) => self.debt_floor = v,
            PoolParameter::PositionDebtCeiling(v) => self.position_debt_ceiling = v,
            PoolParameter::LiquidationRatio(v) => {
                validate_liquidation_ratio(v)?;
                self.liquidation_ratio = v;
            }
            PoolParameter::CloseFactorBps(v) => {
                validate_close_factor(v)?;
                self.close_factor_bps = v;
            }
            PoolParameter::LiquidatorIncentiveBps(v) => {
                validate_liquidator_incentive(v)?;
                self.liquidator_incentive_bps = v;
            }
            PoolParameter::TreasuryFeesBps(v) => {
                validate_treasury_fees(v)?;
                self.treasury_fees_bps = v;
            }
            PoolParameter::Strategy(v) => self.strategy = Some(v),
            PoolParameter::PriceFeed(v) => self.price_feed = Some(v),
            PoolParameter::Adapter(v) => self.adapter = Some(v),
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameters supplied at pool initialization
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum pool debt value
    pub debt_ceiling: Rad,
    /// Minimum non-zero position debt value
    pub debt_floor: Rad,
    /// Maximum debt value of a single position
    pub position_debt_ceiling: Rad,
    /// Required over-collateralization ratio
    pub liquidation_ratio: Ray,
    /// Close factor in bps
    pub close_factor_bps: u32,
    /// Liquidator incentive in bps
    pub liquidator_incentive_bps: u32,
    /// Treasury share of the bonus in bps
    pub treasury_fees_bps: u32,
    /// Strategy address
    pub strategy: Option<Address>,
    /// Price feed
    pub price_feed: Option<Arc<dyn PriceFeed>>,
    /// Custody adapter
    pub adapter: Option<Arc<dyn CollateralAdapter>>,
}

impl PoolConfig {
    /// Validate liquidation parameters
    pub fn validate(&self) -> Result<()> {
        validate_liquidation_ratio(self.liquidation_ratio)?;
        validate_close_factor(self.close_factor_bps)?;
        validate_liquidator_incentive(self.liquidator_incentive_bps)?;
        validate_treasury_fees(self.treasury_fees_bps)
    }

    /// Attach a price feed
    pub fn with_price_feed(mut self, feed: Arc<dyn PriceFeed>) -> Self {
        self.price_feed = Some(feed);
        self
    }

    /// Attach a custody adapter
    pub fn with_adapter(mut self, adapter: Arc<dyn CollateralAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Attach a strategy address
    pub fn with_strategy(mut self, strategy: Address) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            debt_ceiling: Rad::ZERO,
            debt_floor: Rad::ZERO,
            position_debt_ceiling: Rad::ZERO,
            liquidation_ratio: Ray::ONE,
            close_factor_bps: DEFAULT_CLOSE_FACTOR_BPS,
            liquidator_incentive_bps: DEFAULT_LIQUIDATOR_INCENTIVE_BPS,
            treasury_fees_bps: DEFAULT_TREASURY_FEES_BPS,
            strategy: None,
            price_feed: None,
            adapter: None,
        }
    }
}

/// A single governance parameter change
#[derive(Debug, Clone)]
pub enum PoolParameter {
    /// Pool debt ceiling
    DebtCeiling(Rad),
    /// Debt floor
    DebtFloor(Rad),
    /// Position debt ceiling
    PositionDebtCeiling(Rad),
    /// Liquidation ratio
    LiquidationRatio(Ray),
    /// Close factor
    CloseFactorBps(u32),
    /// Liquidator incentive
    LiquidatorIncentiveBps(u32),
    /// Treasury fees
    TreasuryFeesBps(u32),
    /// Strategy address
    Strategy(Address),
    /// Price feed
    PriceFeed(Arc<dyn PriceFeed>),
    /// Custody adapter
    Adapter(Arc<dyn CollateralAdapter>),
}

impl PoolParameter {
    /// Parameter name
    pub fn name(&self) -> &'static str {
        match self {
            Self::DebtCeiling(_) => "debt_ceiling",
            Self::DebtFloor(_) => "debt_floor",
            Self::PositionDebtCeiling(_) => "position_debt_ceiling",
            Self::LiquidationRatio(_) => "liquidation_ratio",
            Self::CloseFactorBps(_) => "close_factor_bps",
            Self::LiquidatorIncentiveBps(_) => "liquidator_incentive_bps",
            Self::TreasuryFeesBps(_) => "treasury_fees_bps",
            Self::Strategy(_) => "strategy",
            Self::PriceFeed(_) => "price_feed",
            Self::Adapter(_) => "adapter",
        }
    }

    /// Display form of the new value
    pub fn value_string(&self) -> String {
        match self {
            Self::DebtCeiling(v) | Self::DebtFloor(v) | Self::PositionDebtCeiling(v) => v.to_string(),
            Self::LiquidationRatio(v) => v.to_string(),
            Self::CloseFactorBps(v) | Self::LiquidatorIncentiveBps(v) | Self::TreasuryFeesBps(v) => {
                v.to_string()
            }
            Self::Strategy(v) => v.to_hex(),
            Self::PriceFeed(_) => "feed".into(),
            Self::Adapter(_) => "adapter".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Pool {
        let config = PoolConfig {
            debt_ceiling: Rad::from_units(1_000_000),
            liquidation_ratio: Ray::from_bps(13_300),
            ..PoolConfig::default()
        };
        Pool::new(PoolId::from_label("WXDC").unwrap(), config).unwrap()
    }

    #[test]
    fn test_new_pool_starts_at_unit_rate() {
        let pool = pool();
        assert!(pool.is_initialized());
        assert_eq!(pool.debt_accumulated_rate, Ray::ONE);
        assert_eq!(pool.total_debt(), Rad::ZERO);
        assert!(pool.price_with_safety_margin.is_zero());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PoolConfig {
            close_factor_bps: 0,
            ..PoolConfig::default()
        };
        assert!(Pool::new(PoolId::from_label("X").unwrap(), config).is_err());
    }

    #[test]
    fn test_apply_validates() {
        let mut pool = pool();
        assert!(pool.apply(PoolParameter::TreasuryFeesBps(10_001)).is_err());
        assert_eq!(pool.treasury_fees_bps, DEFAULT_TREASURY_FEES_BPS);

        pool.apply(PoolParameter::CloseFactorBps(10_000)).unwrap();
        assert_eq!(pool.close_factor_bps, 10_000);
        assert_eq!(PoolParameter::CloseFactorBps(1).name(), "close_factor_bps");
    }
}
