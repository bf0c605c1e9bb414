//! Fixed-spread liquidation strategy.
//!
//! The liquidator repays part of an unsafe position's debt and receives
//! collateral worth the repaid debt plus a fixed incentive. A share of the
//! incentive goes to the system debt engine as a treasury fee.
//!
//! ```text
//! debt_share  = min(wanted, max_to_repay, position_debt_share * close_factor)
//! debt_value  = debt_share * rate
//! seized      = debt_value * incentive / price
//! bonus       = seized - debt_value / price
//! fee         = bonus * treasury_fees
//! liquidator  = seized - fee
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use primitive_types::U256;

use crate::access::{ensure_any_role, ensure_role, Role};
use crate::core::adapter::{notify_committed, AdapterMove};
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::liquidation::flash_lending::{FlashLendingCallee, FlashLendingRegistry};
use crate::protocol::events::{LiquidationEvent, PauseChangedEvent, ProtocolEvent};
use crate::utils::constants::{BPS_DIVISOR, MAX_LIQUIDATION_HISTORY};
use crate::utils::math::{mul_div, Rad, Ray, Wad};
use crate::utils::validation::{validate_address, validate_non_zero_wad};

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION MATH
// ═══════════════════════════════════════════════════════════════════════════════

/// Pool and position inputs of one liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationParams {
    /// Debt share of the position
    pub position_debt_share: Wad,
    /// Collateral locked in the position
    pub position_collateral: Wad,
    /// Debt share the liquidator asks to repay
    pub debt_share_wanted: Wad,
    /// Liquidator's upper bound on debt share repaid
    pub max_debt_share_to_repay: Wad,
    /// Pool accumulated rate
    pub debt_accumulated_rate: Ray,
    /// Pool debt floor
    pub debt_floor: Rad,
    /// Feed price (Unit)
    pub price: Wad,
    /// Close factor in bps
    pub close_factor_bps: u32,
    /// Liquidator incentive in bps
    pub liquidator_incentive_bps: u32,
    /// Treasury share of the bonus in bps
    pub treasury_fees_bps: u32,
}

/// Quantities computed for one liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationInfo {
    /// Debt share removed from the position
    pub debt_share_to_liquidate: Wad,
    /// Stablecoin value repaid
    pub debt_value: Rad,
    /// Collateral taken from the position
    pub collateral_seized: Wad,
    /// Collateral sent to the recipient
    pub collateral_to_liquidator: Wad,
    /// Collateral kept by the treasury
    pub treasury_fee: Wad,
}

/// Compute the liquidation quantities, rounding every division down
pub fn calculate_liquidation(params: &LiquidationParams) -> Result<LiquidationInfo> {
    let rate = params.debt_accumulated_rate;
    let price = Ray::from_wad(params.price)?;
    let close_cap = params.position_debt_share.mul_bps(params.close_factor_bps)?;

    let mut debt_share = params
        .debt_share_wanted
        .min(params.max_debt_share_to_repay)
        .min(close_cap);
    validate_non_zero_wad(debt_share)?;

    // A dust remainder is closed out when the whole position is allowed.
    let remaining = params.position_debt_share.checked_sub(debt_share)?;
    if !remaining.is_zero()
        && remaining.mul_ray(rate) < params.debt_floor
        && params.position_debt_share <= close_cap.min(params.max_debt_share_to_repay)
    {
        debt_share = params.position_debt_share;
    }

    let mut debt_value = debt_share.mul_ray(rate);
    let mut seized = debt_value.mul_bps(params.liquidator_incentive_bps)?.div_ray(price)?;

    if seized > params.position_collateral {
        seized = params.position_collateral;
        let covered = seized.mul_ray(price);
        let repayable = mul_div(
            covered.raw(),
            U256::from(BPS_DIVISOR),
            U256::from(params.liquidator_incentive_bps),
        )
        .ok_or_else(|| Error::Overflow {
            operation: "liquidation debt from collateral".into(),
        })?;
        debt_share = Rad::from_raw(repayable).div_ray(rate)?;
        validate_non_zero_wad(debt_share)?;
        debt_value = debt_share.mul_ray(rate);
    }

    let par_value = debt_value.div_ray(price)?;
    let bonus = seized.checked_sub(par_value)?;
    let treasury_fee = bonus.mul_bps(params.treasury_fees_bps)?;
    let collateral_to_liquidator = seized.checked_sub(treasury_fee)?;

    Ok(LiquidationInfo {
        debt_share_to_liquidate: debt_share,
        debt_value,
        collateral_seized: seized,
        collateral_to_liquidator,
        treasury_fee,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Running totals of executed liquidations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Number of liquidations
    pub total_liquidations: u64,
    /// Stablecoin value repaid
    pub total_debt_repaid: Rad,
    /// Collateral seized
    pub total_collateral_seized: Wad,
    /// Collateral kept as treasury fees
    pub total_treasury_fees: Wad,
    /// Liquidations that used the flash-lending callback
    pub flash_liquidations: u64,
}

impl LiquidationStats {
    fn record(&mut self, info: &LiquidationInfo, flash: bool) {
        self.total_liquidations += 1;
        if flash {
            self.flash_liquidations += 1;
        }
        self.total_debt_repaid = self
            .total_debt_repaid
            .checked_add(info.debt_value)
            .unwrap_or(self.total_debt_repaid);
        self.total_collateral_seized = self
            .total_collateral_seized
            .checked_add(info.collateral_seized)
            .unwrap_or(self.total_collateral_seized);
        self.total_treasury_fees = self
            .total_treasury_fees
            .checked_add(info.treasury_fee)
            .unwrap_or(self.total_treasury_fees);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRATEGY
// ═══════════════════════════════════════════════════════════════════════════════

/// Request to liquidate one position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationRequest {
    /// Pool identifier
    pub pool: PoolId,
    /// Position owner
    pub position_owner: Address,
    /// Debt share the liquidator asks to repay
    pub debt_share_to_repay: Wad,
    /// Liquidator's upper bound on debt share repaid
    pub max_debt_share_to_repay: Wad,
    /// Liquidator paying the stablecoin
    pub liquidator: Address,
    /// Account receiving the collateral
    pub collateral_recipient: Address,
    /// Opaque data passed to the flash-lending callee and adapter
    pub data: Vec<u8>,
}

/// Fixed-spread liquidation executed against the ledger
#[derive(Debug)]
pub struct FixedSpreadLiquidationStrategy {
    address: Address,
    debt_engine: Address,
    flash_lending_enabled: bool,
    callees: FlashLendingRegistry,
    paused: bool,
    stats: LiquidationStats,
    history: VecDeque<LiquidationEvent>,
}

impl FixedSpreadLiquidationStrategy {
    /// Create a strategy acting as `address`; fees and repayments go to `debt_engine`
    pub fn new(address: Address, debt_engine: Address) -> Self {
        Self {
            address,
            debt_engine,
            flash_lending_enabled: false,
            callees: FlashLendingRegistry::new(),
            paused: false,
            stats: LiquidationStats::default(),
            history: VecDeque::new(),
        }
    }

    /// Strategy address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Running totals
    pub fn stats(&self) -> LiquidationStats {
        self.stats
    }

    /// Most recent liquidations, oldest first
    pub fn recent_events(&self) -> impl Iterator<Item = &LiquidationEvent> {
        self.history.iter()
    }

    /// Whether the flash-lending path is enabled
    pub fn flash_lending_enabled(&self) -> bool {
        self.flash_lending_enabled
    }

    /// Enable or disable flash lending (owner)
    pub fn set_flash_lending_enabled(&mut self, ledger: &Ledger, caller: &Address, enabled: bool) -> Result<()> {
        ensure_role(ledger.access(), Role::Owner, caller)?;
        self.flash_lending_enabled = enabled;
        tracing::info!(enabled, "flash lending toggled");
        Ok(())
    }

    /// Register the caller's own flash-lending callee
    pub fn register_flash_lending_callee(&mut self, caller: &Address, callee: Arc<dyn FlashLendingCallee>) {
        self.callees.register(*caller, callee);
    }

    /// Remove the caller's flash-lending callee
    pub fn unregister_flash_lending_callee(&mut self, caller: &Address) -> bool {
        self.callees.unregister(caller)
    }

    /// Block executions (owner or governance)
    pub fn pause(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()> {
        self.set_paused(ledger, caller, true)
    }

    /// Resume executions
    pub fn unpause(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()> {
        self.set_paused(ledger, caller, false)
    }

    fn set_paused(&mut self, ledger: &mut Ledger, caller: &Address, paused: bool) -> Result<()> {
        ensure_any_role(ledger.access(), &[Role::Owner, Role::Governance], caller)?;
        self.paused = paused;
        ledger.emit(ProtocolEvent::PauseChanged(PauseChangedEvent {
            component: "liquidation_strategy".into(),
            paused,
        }));
        Ok(())
    }

    /// Liquidate part of an unsafe position.
    ///
    /// `caller` must hold the liquidation engine role; the liquidator must have
    /// whitelisted this strategy so that the repayment can be pulled.
    pub fn execute(
        &mut self,
        ledger: &mut Ledger,
        caller: &Address,
        position_debt_share: Wad,
        position_collateral: Wad,
        request: &LiquidationRequest,
    ) -> Result<LiquidationInfo> {
        ensure_role(ledger.access(), Role::LiquidationEngine, caller)?;
        if self.paused {
            return Err(Error::Paused);
        }
        validate_non_zero_wad(position_debt_share)?;
        validate_non_zero_wad(position_collateral)?;
        validate_address(&request.position_owner, "position_owner")?;
        validate_address(&request.collateral_recipient, "collateral_recipient")?;

        let pool = ledger.pool(&request.pool)?;
        let feed = pool
            .price_feed
            .clone()
            .ok_or_else(|| Error::MissingPriceFeed(request.pool.label()))?;
        let adapter = pool.adapter.clone();
        let (price, ok) = feed.peek_price();
        if !ok {
            return Err(Error::InvalidPrice);
        }
        if price.is_zero() {
            return Err(Error::ZeroCollateralPrice);
        }

        let info = calculate_liquidation(&LiquidationParams {
            position_debt_share,
            position_collateral,
            debt_share_wanted: request.debt_share_to_repay,
            max_debt_share_to_repay: request.max_debt_share_to_repay,
            debt_accumulated_rate: pool.debt_accumulated_rate,
            debt_floor: pool.debt_floor,
            price,
            close_factor_bps: pool.close_factor_bps,
            liquidator_incentive_bps: pool.liquidator_incentive_bps,
            treasury_fees_bps: pool.treasury_fees_bps,
        })?;

        let callee = if self.flash_lending_enabled && !request.data.is_empty() {
            self.callees.get(&request.collateral_recipient)
        } else {
            None
        };
        let flash = callee.is_some();
        let strategy = self.address;
        let debt_engine = self.debt_engine;

        let event = ledger.atomically(|l| {
            let collateral_delta = info
                .collateral_seized
                .to_signed()
                .map(|v| -v)
                .ok_or_else(|| Error::CollateralAmountOverflow(info.collateral_seized.to_string()))?;
            let debt_share_delta = info
                .debt_share_to_liquidate
                .to_signed()
                .map(|v| -v)
                .ok_or_else(|| Error::CollateralAmountOverflow(info.debt_share_to_liquidate.to_string()))?;

            l.confiscate_position(
                &strategy,
                &request.pool,
                &request.position_owner,
                &strategy,
                &debt_engine,
                collateral_delta,
                debt_share_delta,
            )?;

            if !info.collateral_to_liquidator.is_zero() {
                l.move_collateral(
                    &strategy,
                    &request.pool,
                    &strategy,
                    &request.collateral_recipient,
                    info.collateral_to_liquidator,
                )?;
            }
            if !info.treasury_fee.is_zero() {
                l.move_collateral(&strategy, &request.pool, &strategy, &debt_engine, info.treasury_fee)?;
            }

            if let Some(callee) = &callee {
                callee
                    .flash_lending_call(
                        l,
                        &request.liquidator,
                        info.debt_value,
                        info.collateral_to_liquidator,
                        &request.data,
                    )
                    .map_err(|e| Error::FlashLendingFailed(e.to_string()))?;
            }

            l.move_stablecoin(&strategy, &request.liquidator, &debt_engine, info.debt_value)?;

            // Debt left behind without collateral can never be liquidated again.
            let remaining = l.position(&request.pool, &request.position_owner);
            let written_off = if remaining.locked_collateral.is_zero() && !remaining.debt_share.is_zero() {
                let debt_share_delta = remaining
                    .debt_share
                    .to_signed()
                    .ok_or_else(|| Error::CollateralAmountOverflow(remaining.debt_share.to_string()))?;
                l.confiscate_position(
                    &strategy,
                    &request.pool,
                    &request.position_owner,
                    &strategy,
                    &debt_engine,
                    0,
                    -debt_share_delta,
                )?;
                remaining.debt_share
            } else {
                Wad::ZERO
            };

            let event = LiquidationEvent {
                pool: request.pool,
                position_owner: request.position_owner,
                liquidator: request.liquidator,
                collateral_recipient: request.collateral_recipient,
                price,
                debt_share_liquidated: info.debt_share_to_liquidate,
                debt_value: info.debt_value,
                collateral_seized: info.collateral_seized,
                collateral_to_liquidator: info.collateral_to_liquidator,
                treasury_fee: info.treasury_fee,
                debt_share_written_off: written_off,
                flash_lending: flash,
            };
            l.emit(ProtocolEvent::Liquidation(event.clone()));
            Ok(event)
        })?;

        if let Some(adapter) = &adapter {
            let mut moves = Vec::with_capacity(2);
            if !info.collateral_to_liquidator.is_zero() {
                moves.push((
                    AdapterMove {
                        pool: request.pool,
                        src: strategy,
                        dst: request.collateral_recipient,
                        amount: info.collateral_to_liquidator,
                    },
                    request.data.as_slice(),
                ));
            }
            if !info.treasury_fee.is_zero() {
                moves.push((
                    AdapterMove {
                        pool: request.pool,
                        src: strategy,
                        dst: debt_engine,
                        amount: info.treasury_fee,
                    },
                    &[][..],
                ));
            }
            notify_committed(&**adapter, &moves);
        }

        let written_off = event.debt_share_written_off;
        self.stats.record(&info, flash);
        if self.history.len() == MAX_LIQUIDATION_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(event);

        tracing::info!(
            pool = %request.pool,
            owner = %request.position_owner.short(),
            debt_share = %info.debt_share_to_liquidate,
            %written_off,
            seized = %info.collateral_seized,
            fee = %info.treasury_fee,
            flash,
            "position liquidated"
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::WAD;

    fn params() -> LiquidationParams {
        LiquidationParams {
            position_debt_share: Wad::from_units(10),
            position_collateral: Wad::from_units(100),
            debt_share_wanted: Wad::from_units(1),
            max_debt_share_to_repay: Wad::from_units(10),
            debt_accumulated_rate: Ray::from_bps(20_000),
            debt_floor: Rad::ZERO,
            price: Wad::ONE,
            close_factor_bps: 10_000,
            liquidator_incentive_bps: 10_250,
            treasury_fees_bps: 2_500,
        }
    }

    #[test]
    fn test_reference_vector() {
        let info = calculate_liquidation(&params()).unwrap();
        assert_eq!(info.debt_share_to_liquidate, Wad::from_units(1));
        assert_eq!(info.debt_value, Rad::from_units(2));
        assert_eq!(info.collateral_seized, Wad::from_raw(2_050_000_000_000_000_000));
        assert_eq!(info.treasury_fee, Wad::from_raw(12_500_000_000_000_000));
        assert_eq!(info.collateral_to_liquidator, Wad::from_raw(2_037_500_000_000_000_000));
    }

    #[test]
    fn test_close_factor_caps_share() {
        let info = calculate_liquidation(&LiquidationParams {
            debt_share_wanted: Wad::from_units(10),
            close_factor_bps: 5_000,
            ..params()
        })
        .unwrap();
        assert_eq!(info.debt_share_to_liquidate, Wad::from_units(5));
    }

    #[test]
    fn test_max_to_repay_caps_share() {
        let info = calculate_liquidation(&LiquidationParams {
            debt_share_wanted: Wad::from_units(10),
            max_debt_share_to_repay: Wad::from_units(3),
            ..params()
        })
        .unwrap();
        assert_eq!(info.debt_share_to_liquidate, Wad::from_units(3));
    }

    #[test]
    fn test_seized_capped_at_collateral() {
        // debt 10 * 2 = 20 needs 20.5 collateral, only 10 available
        let info = calculate_liquidation(&LiquidationParams {
            position_collateral: Wad::from_units(10),
            debt_share_wanted: Wad::from_units(10),
            ..params()
        })
        .unwrap();
        assert_eq!(info.collateral_seized, Wad::from_units(10));
        assert!(info.debt_share_to_liquidate < Wad::from_units(5));
        assert!(info.debt_value.div_ray(Ray::ONE).unwrap() <= Wad::from_units(10));
        assert_eq!(
            info.collateral_seized,
            info.collateral_to_liquidator.checked_add(info.treasury_fee).unwrap()
        );
    }

    #[test]
    fn test_dust_remainder_closed() {
        // remaining 0.5 share * 2 = 1 stablecoin < floor 5
        let info = calculate_liquidation(&LiquidationParams {
            debt_share_wanted: Wad::from_raw(9 * WAD + WAD / 2),
            debt_floor: Rad::from_units(5),
            ..params()
        })
        .unwrap();
        assert_eq!(info.debt_share_to_liquidate, Wad::from_units(10));
    }

    #[test]
    fn test_dust_remainder_kept_when_close_factor_forbids() {
        let info = calculate_liquidation(&LiquidationParams {
            position_debt_share: Wad::from_units(2),
            debt_share_wanted: Wad::from_units(2),
            close_factor_bps: 5_000,
            debt_floor: Rad::from_units(5),
            ..params()
        })
        .unwrap();
        assert_eq!(info.debt_share_to_liquidate, Wad::from_units(1));
    }

    #[test]
    fn test_zero_wanted_rejected() {
        let result = calculate_liquidation(&LiquidationParams {
            debt_share_wanted: Wad::ZERO,
            ..params()
        });
        assert!(matches!(result, Err(Error::ZeroAmount)));
    }
}
