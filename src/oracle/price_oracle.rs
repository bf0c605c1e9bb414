//! Price safety oracle.
//!
//! Turns a pool's raw feed price into the conservative safety-margin price the
//! ledger judges positions with:
//!
//! `price_with_safety_margin = price / reference_price / liquidation_ratio`
//!
//! computed in Rate scale with floor division at each step. A stale or invalid
//! feed writes zero, which makes every indebted position in the pool unsafe.

use serde::{Deserialize, Serialize};

use crate::access::{ensure_any_role, ensure_role, Role};
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::protocol::events::{
    CagedEvent, PauseChangedEvent, PriceUpdatedEvent, ProtocolEvent, ReferencePriceSetEvent,
};
use crate::settlement::Cageable;
use crate::utils::constants::{DEFAULT_REFERENCE_PRICE_MAX, DEFAULT_REFERENCE_PRICE_MIN};
use crate::utils::math::{Ray, Wad};

/// Safety-margin price computation for a fresh feed price
pub fn safety_margin_price(price: Wad, reference_price: Ray, liquidation_ratio: Ray) -> Result<Ray> {
    Ray::from_wad(price)?.rdiv(reference_price)?.rdiv(liquidation_ratio)
}

/// Writes safety-margin prices into the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceOracle {
    address: Address,
    reference_price: Ray,
    reference_price_min: Ray,
    reference_price_max: Ray,
    live: bool,
    paused: bool,
}

impl PriceOracle {
    /// Create an oracle acting as `address` (must hold the price oracle role)
    pub fn new(address: Address) -> Self {
        Self {
            address,
            reference_price: Ray::ONE,
            reference_price_min: Ray::from_raw(DEFAULT_REFERENCE_PRICE_MIN),
            reference_price_max: Ray::from_raw(DEFAULT_REFERENCE_PRICE_MAX),
            live: true,
            paused: false,
        }
    }

    /// Override the allowed reference price band
    pub fn with_reference_band(mut self, min: Ray, max: Ray) -> Result<Self> {
        if min > max || min.is_zero() || self.reference_price < min || self.reference_price > max {
            return Err(Error::InvalidParameter {
                name: "reference_price_band".into(),
                reason: format!("[{}, {}] must be non-empty, positive and contain {}", min, max, self.reference_price),
            });
        }
        self.reference_price_min = min;
        self.reference_price_max = max;
        Ok(self)
    }

    /// Oracle address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current stablecoin reference price
    pub fn reference_price(&self) -> Ray {
        self.reference_price
    }

    /// Whether the oracle is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Recompute and write the safety-margin price of one pool
    pub fn set_price(&self, ledger: &mut Ledger, pool_id: &PoolId) -> Result<Ray> {
        if self.paused {
            return Err(Error::Paused);
        }
        let pool = ledger.pool(pool_id)?;
        let feed = pool
            .price_feed
            .clone()
            .ok_or_else(|| Error::MissingPriceFeed(pool_id.label()))?;
        let liquidation_ratio = pool.liquidation_ratio;

        let (price, ok) = feed.peek_price();
        let spot = if ok {
            safety_margin_price(price, self.reference_price, liquidation_ratio)?
        } else {
            tracing::warn!(pool = %pool_id, %price, "price feed not ok, safety margin price degraded to zero");
            Ray::ZERO
        };

        ledger.set_price_with_safety_margin(&self.address, pool_id, spot)?;
        ledger.emit(ProtocolEvent::PriceUpdated(PriceUpdatedEvent {
            pool: *pool_id,
            price,
            ok,
            price_with_safety_margin: spot,
        }));
        tracing::debug!(pool = %pool_id, %price, ok, %spot, "price updated");
        Ok(spot)
    }

    /// [`PriceOracle::set_price`] for several pools, all or nothing
    pub fn set_prices(&self, ledger: &mut Ledger, pools: &[PoolId]) -> Result<Vec<Ray>> {
        ledger.atomically(|ledger| {
            pools
                .iter()
                .map(|pool| self.set_price(ledger, pool))
                .collect()
        })
    }

    /// Set the stablecoin reference price (owner, before cage, within band)
    pub fn set_stable_coin_reference_price(&mut self, ledger: &mut Ledger, caller: &Address, value: Ray) -> Result<()> {
        ensure_role(ledger.access(), Role::Owner, caller)?;
        if !self.live {
            return Err(Error::NotLive);
        }
        if value < self.reference_price_min || value > self.reference_price_max {
            return Err(Error::InvalidParameter {
                name: "reference_price".into(),
                reason: format!(
                    "{} outside [{}, {}]",
                    value, self.reference_price_min, self.reference_price_max
                ),
            });
        }
        self.reference_price = value;
        ledger.emit(ProtocolEvent::ReferencePriceSet(ReferencePriceSetEvent { value }));
        tracing::info!(%value, "reference price set");
        Ok(())
    }

    /// Block price updates (owner or governance)
    pub fn pause(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()> {
        self.set_paused(ledger, caller, true)
    }

    /// Resume price updates
    pub fn unpause(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()> {
        self.set_paused(ledger, caller, false)
    }

    fn set_paused(&mut self, ledger: &mut Ledger, caller: &Address, paused: bool) -> Result<()> {
        ensure_any_role(ledger.access(), &[Role::Owner, Role::Governance], caller)?;
        self.paused = paused;
        ledger.emit(ProtocolEvent::PauseChanged(PauseChangedEvent {
            component: self.component().into(),
            paused,
        }));
        tracing::info!(paused, "price oracle pause changed");
        Ok(())
    }
}

impl Cageable for PriceOracle {
    fn component(&self) -> &'static str {
        "price_oracle"
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn cage(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()> {
        ensure_any_role(ledger.access(), &[Role::Owner, Role::Settlement], caller)?;
        if !self.live {
            return Err(Error::AlreadyCaged);
        }
        self.live = false;
        ledger.emit(ProtocolEvent::Caged(CagedEvent {
            component: self.component().into(),
        }));
        tracing::info!("price oracle caged");
        Ok(())
    }
}
