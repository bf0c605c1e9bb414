//! Liquidation engine.
//!
//! Entry point for liquidators: checks that the engine is running and that
//! the position is unsafe at the pool's safety-margin price, then hands the
//! position to the strategy configured for the pool.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::access::{ensure_any_role, ensure_role, Role};
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::liquidation::strategy::{FixedSpreadLiquidationStrategy, LiquidationInfo, LiquidationRequest};
use crate::protocol::events::{CagedEvent, PauseChangedEvent, ProtocolEvent};
use crate::settlement::Cageable;
use crate::utils::math::Rad;

// ═══════════════════════════════════════════════════════════════════════════════
// CANDIDATES
// ═══════════════════════════════════════════════════════════════════════════════

/// Unsafe position found by [`LiquidationEngine::find_liquidatable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationCandidate {
    /// Position owner
    pub owner: Address,
    /// Debt value at the current rate
    pub debt_value: Rad,
    /// Collateral value at the safety-margin price
    pub collateral_value: Rad,
}

impl LiquidationCandidate {
    /// Debt not covered by the collateral value
    pub fn shortfall(&self) -> Rad {
        self.debt_value.saturating_sub(self.collateral_value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Liquidation orchestrator
#[derive(Debug)]
pub struct LiquidationEngine {
    address: Address,
    live: bool,
    paused: bool,
    strategies: HashMap<Address, FixedSpreadLiquidationStrategy>,
}

impl LiquidationEngine {
    /// Create an engine acting as `address` (must hold the liquidation engine role)
    pub fn new(address: Address) -> Self {
        Self {
            address,
            live: true,
            paused: false,
            strategies: HashMap::new(),
        }
    }

    /// Engine address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether liquidations are paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Register a strategy under its address (owner)
    pub fn register_strategy(
        &mut self,
        ledger: &Ledger,
        caller: &Address,
        strategy: FixedSpreadLiquidationStrategy,
    ) -> Result<()> {
        ensure_role(ledger.access(), Role::Owner, caller)?;
        tracing::info!(strategy = %strategy.address().short(), "liquidation strategy registered");
        self.strategies.insert(strategy.address(), strategy);
        Ok(())
    }

    /// Strategy registered at `address`
    pub fn strategy(&self, address: &Address) -> Option<&FixedSpreadLiquidationStrategy> {
        self.strategies.get(address)
    }

    /// Mutable strategy registered at `address`
    pub fn strategy_mut(&mut self, address: &Address) -> Option<&mut FixedSpreadLiquidationStrategy> {
        self.strategies.get_mut(address)
    }

    /// Unsafe positions of `pool`, largest shortfall first
    pub fn find_liquidatable(&self, ledger: &Ledger, pool: &PoolId) -> Result<Vec<LiquidationCandidate>> {
        let pool_state = ledger.pool(pool)?;
        let rate = pool_state.debt_accumulated_rate;
        let spot = pool_state.price_with_safety_margin;

        let mut candidates: Vec<LiquidationCandidate> = ledger
            .positions(pool)
            .into_iter()
            .filter(|(_, position)| !position.debt_share.is_zero() && !position.is_safe(rate, spot))
            .map(|(owner, position)| LiquidationCandidate {
                owner,
                debt_value: position.debt_value(rate),
                collateral_value: position.collateral_value(spot),
            })
            .collect();
        candidates.sort_by(|a, b| b.shortfall().cmp(&a.shortfall()).then(a.owner.cmp(&b.owner)));
        Ok(candidates)
    }

    /// Liquidate one unsafe position; `caller` is the liquidator paying the debt
    pub fn liquidate(&mut self, ledger: &mut Ledger, caller: &Address, request: &LiquidationRequest) -> Result<LiquidationInfo> {
        if !self.live {
            return Err(Error::NotLive);
        }
        if self.paused {
            return Err(Error::Paused);
        }
        if caller != &request.liquidator {
            return Err(Error::NotAllowed {
                owner: request.liquidator.to_hex(),
                caller: caller.to_hex(),
            });
        }

        let pool = ledger.pool(&request.pool)?;
        let rate = pool.debt_accumulated_rate;
        let spot = pool.price_with_safety_margin;
        let strategy_address = pool.strategy.ok_or_else(|| Error::InvalidParameter {
            name: "strategy".into(),
            reason: format!("pool {} has no liquidation strategy", request.pool),
        })?;

        let position = ledger.position(&request.pool, &request.position_owner);
        if position.debt_share.is_zero() || position.locked_collateral.is_zero() {
            return Err(Error::ZeroAmount);
        }
        if position.is_safe(rate, spot) {
            return Err(Error::PositionIsSafe);
        }

        let engine = self.address;
        let strategy = self
            .strategies
            .get_mut(&strategy_address)
            .ok_or_else(|| Error::InvalidParameter {
                name: "strategy".into(),
                reason: format!("strategy {} not registered", strategy_address.short()),
            })?;

        strategy.execute(
            ledger,
            &engine,
            position.debt_share,
            position.locked_collateral,
            request,
        )
    }

    /// Liquidate several positions independently; one failure does not stop the rest
    pub fn batch_liquidate(
        &mut self,
        ledger: &mut Ledger,
        caller: &Address,
        requests: &[LiquidationRequest],
    ) -> Vec<Result<LiquidationInfo>> {
        let results: Vec<Result<LiquidationInfo>> = requests
            .iter()
            .map(|request| self.liquidate(ledger, caller, request))
            .collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!(total = requests.len(), failed, "batch liquidation had failures");
        }
        results
    }

    /// Block liquidations (owner or governance)
    pub fn pause(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()> {
        self.set_paused(ledger, caller, true)
    }

    /// Resume liquidations
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
        tracing::info!(paused, "liquidation engine pause changed");
        Ok(())
    }
}

impl Cageable for LiquidationEngine {
    fn component(&self) -> &'static str {
        "liquidation_engine"
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
        tracing::info!("liquidation engine caged");
        Ok(())
    }
}
