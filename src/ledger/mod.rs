//! The ledger: single source of truth for collateral, positions and stablecoin.
//!
//! Every entry point takes the caller's address and checks it against the
//! injected [`AccessControl`] or the owner/delegate whitelist before any state
//! changes. Simple operations validate first and commit last, so a failing call
//! leaves the ledger untouched. Composite operations built from several ledger
//! calls run inside [`Ledger::atomically`].

mod operations;
mod state;

pub use state::LedgerState;

use std::sync::Arc;

use crate::access::{ensure_any_role, ensure_role, AccessControl, Role};
use crate::core::pool::{Pool, PoolConfig, PoolParameter};
use crate::core::position::Position;
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::protocol::events::{
    CagedEvent, EventLog, PauseChangedEvent, PoolInitializedEvent, PoolParameterUpdatedEvent,
    ProtocolEvent, TotalDebtCeilingSetEvent, WhitelistUpdatedEvent,
};
use crate::utils::math::{Rad, Ray, Wad};

/// Collateral, debt and stablecoin accounting
pub struct Ledger {
    state: LedgerState,
    access: Arc<dyn AccessControl>,
    events: EventLog,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("pools", &self.state.pools.len())
            .field("positions", &self.state.positions.len())
            .field("live", &self.state.live)
            .field("paused", &self.state.paused)
            .field("events", &self.events.len())
            .finish()
    }
}

impl Ledger {
    /// Create an empty live ledger
    pub fn new(access: Arc<dyn AccessControl>) -> Self {
        Self {
            state: LedgerState::new(),
            access,
            events: EventLog::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSACTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run `f` as one all-or-nothing transaction.
    ///
    /// On error the state and the event log are restored to what they were
    /// before `f` ran.
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.state.clone();
        let mark = self.events.len();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = snapshot;
                self.events.truncate(mark);
                tracing::warn!(error = %err, "ledger transaction rolled back");
                Err(err)
            }
        }
    }

    /// Append an event stamped with the current block
    pub(crate) fn emit(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    /// Set the block context for subsequent events
    pub fn set_block(&mut self, block_height: u64, timestamp: u64) {
        self.events.set_block(block_height, timestamp);
    }

    /// Event log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Access control shared with the other components
    pub fn access(&self) -> &dyn AccessControl {
        self.access.as_ref()
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> LedgerState {
        self.state.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Initialized pool by id
    pub fn pool(&self, id: &PoolId) -> Result<&Pool> {
        self.state
            .pools
            .get(id)
            .filter(|pool| pool.is_initialized())
            .ok_or_else(|| Error::PoolNotInitialized(id.label()))
    }

    /// All pool ids, sorted
    pub fn pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<PoolId> = self.state.pools.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Position of `owner` in `pool` (empty if none)
    pub fn position(&self, pool: &PoolId, owner: &Address) -> Position {
        self.state
            .positions
            .get(&(*pool, *owner))
            .copied()
            .unwrap_or_default()
    }

    /// Every non-empty position in `pool`
    pub fn positions(&self, pool: &PoolId) -> Vec<(Address, Position)> {
        let mut positions: Vec<(Address, Position)> = self
            .state
            .positions
            .iter()
            .filter(|((p, _), _)| p == pool)
            .map(|((_, owner), position)| (*owner, *position))
            .collect();
        positions.sort_by_key(|(owner, _)| *owner);
        positions
    }

    /// Free collateral of `owner` in `pool`
    pub fn collateral_token(&self, pool: &PoolId, owner: &Address) -> Wad {
        self.state
            .collateral_token
            .get(&(*pool, *owner))
            .copied()
            .unwrap_or_default()
    }

    /// Locked plus free collateral of a pool
    pub fn pool_collateral_total(&self, pool: &PoolId) -> Result<Wad> {
        let locked = self
            .state
            .positions
            .iter()
            .filter(|((p, _), _)| p == pool)
            .try_fold(Wad::ZERO, |acc, (_, position)| acc.checked_add(position.locked_collateral))?;
        self.state
            .collateral_token
            .iter()
            .filter(|((p, _), _)| p == pool)
            .try_fold(locked, |acc, (_, amount)| acc.checked_add(*amount))
    }

    /// Stablecoin balance
    pub fn stablecoin(&self, owner: &Address) -> Rad {
        self.state.stablecoin.get(owner).copied().unwrap_or_default()
    }

    /// Bad debt recorded against `owner`
    pub fn system_bad_debt(&self, owner: &Address) -> Rad {
        self.state.system_bad_debt.get(owner).copied().unwrap_or_default()
    }

    /// Stablecoin issued against positions of `pool`
    pub fn pool_stablecoin_issued(&self, pool: &PoolId) -> Rad {
        self.state
            .pool_stablecoin_issued
            .get(pool)
            .copied()
            .unwrap_or_default()
    }

    /// Total stablecoin in existence
    pub fn total_stablecoin_issued(&self) -> Rad {
        self.state.total_stablecoin_issued
    }

    /// Total unbacked stablecoin (bad debt)
    pub fn total_unbacked_stablecoin(&self) -> Rad {
        self.state.total_unbacked_stablecoin
    }

    /// Global debt ceiling
    pub fn total_debt_ceiling(&self) -> Rad {
        self.state.total_debt_ceiling
    }

    /// Whether the ledger is live (not caged)
    pub fn is_live(&self) -> bool {
        self.state.live
    }

    /// Whether the ledger is paused
    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    /// Whether `caller` may act on `owner`'s balances and positions
    pub fn can_modify(&self, owner: &Address, caller: &Address) -> bool {
        owner == caller || self.state.whitelist.contains(&(*owner, *caller))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GUARDS
    // ═══════════════════════════════════════════════════════════════════════════

    fn ensure_not_paused(&self) -> Result<()> {
        if self.state.paused {
            return Err(Error::Paused);
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if !self.state.live {
            return Err(Error::NotLive);
        }
        Ok(())
    }

    fn ensure_can_modify(&self, owner: &Address, caller: &Address) -> Result<()> {
        if !self.can_modify(owner, caller) {
            return Err(Error::NotAllowed {
                owner: owner.to_hex(),
                caller: caller.to_hex(),
            });
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WHITELIST
    // ═══════════════════════════════════════════════════════════════════════════

    /// Allow `delegate` to act for the caller
    pub fn whitelist(&mut self, caller: &Address, delegate: Address) -> Result<()> {
        self.set_whitelist(caller, delegate, true)
    }

    /// Revoke `delegate`'s permission to act for the caller
    pub fn blacklist(&mut self, caller: &Address, delegate: Address) -> Result<()> {
        self.set_whitelist(caller, delegate, false)
    }

    fn set_whitelist(&mut self, caller: &Address, delegate: Address, allowed: bool) -> Result<()> {
        let changed = if allowed {
            self.state.whitelist.insert((*caller, delegate))
        } else {
            self.state.whitelist.remove(&(*caller, delegate))
        };
        if changed {
            self.emit(ProtocolEvent::WhitelistUpdated(WhitelistUpdatedEvent {
                owner: *caller,
                delegate,
                allowed,
            }));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // POOL PARAMETERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Create a pool (owner or governance)
    pub fn initialize_pool(&mut self, caller: &Address, id: PoolId, config: PoolConfig) -> Result<()> {
        ensure_any_role(self.access(), &[Role::Owner, Role::Governance], caller)?;
        if self.state.pools.get(&id).is_some_and(Pool::is_initialized) {
            return Err(Error::PoolAlreadyInitialized(id.label()));
        }
        let pool = Pool::new(id, config)?;
        let event = PoolInitializedEvent {
            pool: id,
            debt_ceiling: pool.debt_ceiling,
            debt_floor: pool.debt_floor,
            liquidation_ratio: pool.liquidation_ratio,
        };
        self.state.pools.insert(id, pool);
        self.emit(ProtocolEvent::PoolInitialized(event));
        tracing::info!(pool = %id, "pool initialized");
        Ok(())
    }

    /// Change one pool parameter (owner or governance)
    pub fn update_pool(&mut self, caller: &Address, id: &PoolId, parameter: PoolParameter) -> Result<()> {
        ensure_any_role(self.access(), &[Role::Owner, Role::Governance], caller)?;
        let mut pool = self.pool(id)?.clone();
        let name = parameter.name();
        let value = parameter.value_string();
        pool.apply(parameter)?;
        self.state.pools.insert(*id, pool);
        self.emit(ProtocolEvent::PoolParameterUpdated(PoolParameterUpdatedEvent {
            pool: *id,
            parameter: name.into(),
            value: value.clone(),
        }));
        tracing::info!(pool = %id, parameter = name, %value, "pool parameter updated");
        Ok(())
    }

    /// Write a pool's safety-margin price (price oracle role)
    pub fn set_price_with_safety_margin(&mut self, caller: &Address, id: &PoolId, price: Ray) -> Result<()> {
        ensure_role(self.access(), Role::PriceOracle, caller)?;
        self.pool(id)?;
        if let Some(pool) = self.state.pools.get_mut(id) {
            pool.price_with_safety_margin = price;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set the global debt ceiling (owner, live and not paused)
    pub fn set_total_debt_ceiling(&mut self, caller: &Address, value: Rad) -> Result<()> {
        ensure_role(self.access(), Role::Owner, caller)?;
        self.ensure_not_paused()?;
        self.ensure_live()?;
        self.state.total_debt_ceiling = value;
        self.emit(ProtocolEvent::TotalDebtCeilingSet(TotalDebtCeilingSetEvent { value }));
        tracing::info!(%value, "total debt ceiling set");
        Ok(())
    }

    /// Permanently stop debt and collateral mutation (owner or settlement)
    pub fn cage(&mut self, caller: &Address) -> Result<()> {
        ensure_any_role(self.access(), &[Role::Owner, Role::Settlement], caller)?;
        if !self.state.live {
            return Err(Error::AlreadyCaged);
        }
        self.state.live = false;
        self.emit(ProtocolEvent::Caged(CagedEvent {
            component: "ledger".into(),
        }));
        tracing::info!("ledger caged");
        Ok(())
    }

    /// Block every mutating entry point (owner or governance)
    pub fn pause(&mut self, caller: &Address) -> Result<()> {
        self.set_paused(caller, true)
    }

    /// Resume after [`Ledger::pause`]
    pub fn unpause(&mut self, caller: &Address) -> Result<()> {
        self.set_paused(caller, false)
    }

    fn set_paused(&mut self, caller: &Address, paused: bool) -> Result<()> {
        ensure_any_role(self.access(), &[Role::Owner, Role::Governance], caller)?;
        self.state.paused = paused;
        self.emit(ProtocolEvent::PauseChanged(PauseChangedEvent {
            component: "ledger".into(),
            paused,
        }));
        tracing::info!(paused, "ledger pause changed");
        Ok(())
    }
}
