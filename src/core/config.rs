//! Protocol configuration.
//!
//! Amounts are written as decimal strings (`"1.33"`, `"1000000"`) and
//! converted to the fixed-point scales when the engine is built.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use crate::core::pool::PoolConfig;
use crate::core::types::PoolId;
use crate::error::{Error, Result};
use crate::utils::constants::{
    DEFAULT_CLOSE_FACTOR_BPS, DEFAULT_LIQUIDATOR_INCENTIVE_BPS, DEFAULT_TREASURY_FEES_BPS,
};
use crate::utils::math::{Rad, Ray, Wad};
use crate::utils::validation::{
    validate_close_factor, validate_liquidation_ratio, validate_liquidator_incentive,
    validate_treasury_fees,
};

// ═══════════════════════════════════════════════════════════════════════════════
// POOL SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration of one collateral pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Pool label, at most 32 bytes
    pub id: String,
    /// Pool debt ceiling in stablecoin
    pub debt_ceiling: Decimal,
    /// Minimum non-zero position debt in stablecoin
    pub debt_floor: Decimal,
    /// Maximum position debt in stablecoin
    pub position_debt_ceiling: Decimal,
    /// Over-collateralization ratio, e.g. `1.33`
    pub liquidation_ratio: Decimal,
    /// Close factor in bps
    pub close_factor_bps: u32,
    /// Liquidator incentive in bps
    pub liquidator_incentive_bps: u32,
    /// Treasury share of the liquidation bonus in bps
    pub treasury_fees_bps: u32,
    /// Initial feed price in stablecoin per collateral unit
    pub initial_price: Decimal,
    /// Maximum feed price age in seconds
    pub price_max_age_secs: u64,
}

impl PoolSettings {
    /// Settings with protocol defaults
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            debt_ceiling: Decimal::from(1_000_000u64),
            debt_floor: Decimal::from(100u64),
            position_debt_ceiling: Decimal::from(100_000u64),
            liquidation_ratio: Decimal::new(133, 2),
            close_factor_bps: DEFAULT_CLOSE_FACTOR_BPS,
            liquidator_incentive_bps: DEFAULT_LIQUIDATOR_INCENTIVE_BPS,
            treasury_fees_bps: DEFAULT_TREASURY_FEES_BPS,
            initial_price: Decimal::ONE,
            price_max_age_secs: 3_600,
        }
    }

    /// Pool identifier
    pub fn pool_id(&self) -> Result<PoolId> {
        PoolId::from_label(&self.id)
    }

    /// Initial feed price
    pub fn initial_price(&self) -> Result<Wad> {
        Wad::from_decimal(self.initial_price)
    }

    /// Pool parameters without collaborators
    pub fn to_pool_config(&self) -> Result<PoolConfig> {
        Ok(PoolConfig {
            debt_ceiling: Rad::from_decimal(self.debt_ceiling)?,
            debt_floor: Rad::from_decimal(self.debt_floor)?,
            position_debt_ceiling: Rad::from_decimal(self.position_debt_ceiling)?,
            liquidation_ratio: Ray::from_decimal(self.liquidation_ratio)?,
            close_factor_bps: self.close_factor_bps,
            liquidator_incentive_bps: self.liquidator_incentive_bps,
            treasury_fees_bps: self.treasury_fees_bps,
            ..PoolConfig::default()
        })
    }

    fn validate(&self) -> Result<()> {
        self.pool_id()?;
        validate_liquidation_ratio(Ray::from_decimal(self.liquidation_ratio)?)?;
        validate_close_factor(self.close_factor_bps)?;
        validate_liquidator_incentive(self.liquidator_incentive_bps)?;
        validate_treasury_fees(self.treasury_fees_bps)?;
        if self.debt_floor > self.position_debt_ceiling {
            return Err(Error::Config(format!(
                "pool {}: debt floor {} above position debt ceiling {}",
                self.id, self.debt_floor, self.position_debt_ceiling
            )));
        }
        if self.price_max_age_secs == 0 {
            return Err(Error::Config(format!("pool {}: price max age must be > 0", self.id)));
        }
        self.initial_price().map(|_| ())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Protocol-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Global debt ceiling in stablecoin
    pub total_debt_ceiling: Decimal,
    /// Initial stablecoin reference price
    pub reference_price: Decimal,
    /// Lowest allowed reference price
    pub reference_price_min: Decimal,
    /// Highest allowed reference price
    pub reference_price_max: Decimal,
    /// Whether liquidations may use the flash-lending callback
    pub flash_lending_enabled: bool,
    /// Collateral pools
    pub pools: Vec<PoolSettings>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            total_debt_ceiling: Decimal::from(10_000_000u64),
            reference_price: Decimal::ONE,
            reference_price_min: Decimal::new(9, 1),
            reference_price_max: Decimal::TWO,
            flash_lending_enabled: false,
            pools: vec![PoolSettings::new("WXDC")],
        }
    }
}

impl ProtocolConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Defaults overlaid with `STABLECOIN_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay `STABLECOIN_*` environment variables
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(value) = env_decimal("STABLECOIN_TOTAL_DEBT_CEILING")? {
            self.total_debt_ceiling = value;
        }
        if let Some(value) = env_decimal("STABLECOIN_REFERENCE_PRICE")? {
            self.reference_price = value;
        }
        if let Ok(flag) = std::env::var("STABLECOIN_FLASH_LENDING") {
            self.flash_lending_enabled = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.reference_price_min > self.reference_price_max {
            return Err(Error::Config("reference price band is empty".into()));
        }
        if self.reference_price_min <= Decimal::ZERO {
            return Err(Error::Config("reference price band must be positive".into()));
        }
        if self.reference_price < self.reference_price_min || self.reference_price > self.reference_price_max {
            return Err(Error::Config(format!(
                "reference price {} outside [{}, {}]",
                self.reference_price, self.reference_price_min, self.reference_price_max
            )));
        }
        Rad::from_decimal(self.total_debt_ceiling)?;

        let mut seen = HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.id.as_str()) {
                return Err(Error::Config(format!("duplicate pool {}", pool.id)));
            }
            pool.validate()?;
        }
        Ok(())
    }

    /// Global debt ceiling
    pub fn total_debt_ceiling(&self) -> Result<Rad> {
        Rad::from_decimal(self.total_debt_ceiling)
    }

    /// Reference price and its band
    pub fn reference_prices(&self) -> Result<(Ray, Ray, Ray)> {
        Ok((
            Ray::from_decimal(self.reference_price)?,
            Ray::from_decimal(self.reference_price_min)?,
            Ray::from_decimal(self.reference_price_max)?,
        ))
    }
}

fn env_decimal(name: &str) -> Result<Option<Decimal>> {
    match std::env::var(name) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}
