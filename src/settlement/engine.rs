//! Global settlement engine.
//!
//! ```text
//! Active -> Caged(deadline) -> [pool: Caged(cage_price)]
//!        -> DebtFinalized(total_debt) -> [pool: CashPriceFinalized(cash_price)]
//! ```
//!
//! `cage_price` is collateral per stablecoin at shutdown. Indebted positions
//! are settled at that price into the engine's own collateral balance; what a
//! position cannot cover accumulates as the pool gap. The cash price spreads
//! the collateral actually collected over all outstanding stablecoin.

use primitive_types::U256;
use std::collections::HashMap;

use crate::access::{ensure_role, Role};
use crate::core::adapter::{notify_committed, AdapterMove};
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::oracle::price_oracle::PriceOracle;
use crate::protocol::events::{
    CashPriceFinalizedEvent, DebtFinalizedEvent, LockedCollateralRedeemedEvent, PoolCagedEvent,
    PositionSettledEvent, ProtocolEvent, SettlementStartedEvent, StablecoinAccumulatedEvent,
    StablecoinRedeemedEvent,
};
use crate::settlement::phase::{GlobalPhase, PoolPhase};
use crate::settlement::Cageable;
use crate::utils::constants::RAY;
use crate::utils::math::{mul_div, Ray, Wad};
use crate::utils::validation::{validate_address, validate_cooldown, validate_non_zero_wad};

/// Shutdown and redemption state machine
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    address: Address,
    debt_engine: Address,
    phase: GlobalPhase,
    pools: HashMap<PoolId, PoolPhase>,
    accumulator: HashMap<Address, Wad>,
    redeemed: HashMap<(PoolId, Address), Wad>,
}

impl SettlementEngine {
    /// Create an engine acting as `address` (settlement role); settled debt is
    /// booked against `debt_engine`
    pub fn new(address: Address, debt_engine: Address) -> Self {
        Self {
            address,
            debt_engine,
            phase: GlobalPhase::Active,
            pools: HashMap::new(),
            accumulator: HashMap::new(),
            redeemed: HashMap::new(),
        }
    }

    /// Engine address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Global phase
    pub fn phase(&self) -> GlobalPhase {
        self.phase
    }

    /// Phase of `pool`, once caged
    pub fn pool_phase(&self, pool: &PoolId) -> Option<PoolPhase> {
        self.pools.get(pool).copied()
    }

    /// Cage price of `pool`
    pub fn cage_price(&self, pool: &PoolId) -> Option<Ray> {
        self.pools.get(pool).map(PoolPhase::cage_price)
    }

    /// Cash price of `pool`
    pub fn cash_price(&self, pool: &PoolId) -> Option<Ray> {
        self.pools.get(pool).and_then(PoolPhase::cash_price)
    }

    /// Stablecoin `owner` has accumulated for redemption
    pub fn accumulated(&self, owner: &Address) -> Wad {
        self.accumulator.get(owner).copied().unwrap_or_default()
    }

    /// Stablecoin `owner` has already redeemed against `pool`
    pub fn redeemed(&self, pool: &PoolId, owner: &Address) -> Wad {
        self.redeemed.get(&(*pool, *owner)).copied().unwrap_or_default()
    }

    fn pool_entry(&mut self, pool: &PoolId) -> Result<&mut PoolPhase> {
        self.pools
            .get_mut(pool)
            .ok_or_else(|| Error::PoolNotCaged(pool.label()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SHUTDOWN
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start shutdown (owner): cage the ledger and every live component
    pub fn cage(
        &mut self,
        ledger: &mut Ledger,
        caller: &Address,
        cooldown_secs: u64,
        now: u64,
        components: &mut [&mut dyn Cageable],
    ) -> Result<()> {
        ensure_role(ledger.access(), Role::Owner, caller)?;
        validate_cooldown(cooldown_secs)?;
        let deadline = now.checked_add(cooldown_secs).ok_or_else(|| Error::Overflow {
            operation: "cage deadline".into(),
        })?;
        let phase = self.phase.cage(now, deadline)?;

        if ledger.is_live() {
            ledger.cage(&self.address)?;
        }
        for component in components.iter_mut() {
            if component.is_live() {
                component.cage(ledger, &self.address)?;
            }
        }

        self.phase = phase;
        ledger.emit(ProtocolEvent::SettlementStarted(SettlementStartedEvent {
            caged_at: now,
            deadline,
        }));
        tracing::info!(now, deadline, "global settlement started");
        Ok(())
    }

    /// Snapshot the cage price of `pool` from its feed and the oracle's
    /// reference price
    pub fn cage_pool(&mut self, ledger: &mut Ledger, pool_id: &PoolId, oracle: &PriceOracle) -> Result<Ray> {
        if !self.phase.is_caged() {
            return Err(Error::NotCaged);
        }
        if self.pools.contains_key(pool_id) {
            return Err(Error::PoolAlreadyCaged(pool_id.label()));
        }

        let pool = ledger.pool(pool_id)?;
        let feed = pool
            .price_feed
            .clone()
            .ok_or_else(|| Error::MissingPriceFeed(pool_id.label()))?;
        let (price, ok) = feed.peek_price();
        if !ok {
            return Err(Error::InvalidPrice);
        }
        if price.is_zero() {
            return Err(Error::ZeroCollateralPrice);
        }

        let cage_price = oracle.reference_price().rdiv(Ray::from_wad(price)?)?;
        let debt_at_cage = ledger.pool_stablecoin_issued(pool_id);
        self.pools.insert(*pool_id, PoolPhase::caged(cage_price, debt_at_cage));

        ledger.emit(ProtocolEvent::PoolCaged(PoolCagedEvent {
            pool: *pool_id,
            cage_price,
            debt_at_cage,
        }));
        tracing::info!(pool = %pool_id, %price, %cage_price, %debt_at_cage, "pool caged");
        Ok(cage_price)
    }

    /// Clear the debt of one position at the cage price.
    ///
    /// Takes `min(locked, debt * cage_price)` collateral into the engine and
    /// adds any shortfall to the pool gap.
    pub fn settle_position(&mut self, ledger: &mut Ledger, pool_id: &PoolId, owner: &Address) -> Result<PositionSettledEvent> {
        let label = pool_id.label();
        let cage_price = match self.pools.get(pool_id) {
            Some(PoolPhase::Caged { cage_price, .. }) => *cage_price,
            Some(PoolPhase::CashPriceFinalized { .. }) => return Err(Error::CashPriceAlreadyDefined(label)),
            None => return Err(Error::PoolNotCaged(label)),
        };

        let rate = ledger.pool(pool_id)?.debt_accumulated_rate;
        let position = ledger.position(pool_id, owner);
        validate_non_zero_wad(position.debt_share)?;

        let owed = position.debt_value(rate).mul_ray_to_wad(cage_price)?;
        let taken = owed.min(position.locked_collateral);
        let shortfall = owed.checked_sub(taken)?;

        let collateral_delta = signed(taken)?;
        let debt_share_delta = signed(position.debt_share)?;
        let address = self.address;
        let debt_engine = self.debt_engine;

        let event = ledger.atomically(|l| {
            l.confiscate_position(&address, pool_id, owner, &address, &debt_engine, -collateral_delta, -debt_share_delta)?;
            let event = PositionSettledEvent {
                pool: *pool_id,
                position_owner: *owner,
                debt_share: position.debt_share,
                collateral_taken: taken,
                shortfall,
            };
            l.emit(ProtocolEvent::PositionSettled(event.clone()));
            Ok(event)
        })?;
        self.pool_entry(pool_id)?.add_gap(shortfall, &pool_id.label())?;

        tracing::debug!(pool = %pool_id, owner = %owner.short(), %taken, %shortfall, "position settled");
        Ok(event)
    }

    /// Settle every indebted position of `pool`
    pub fn settle_all_positions(&mut self, ledger: &mut Ledger, pool_id: &PoolId) -> Result<Vec<PositionSettledEvent>> {
        let owners: Vec<Address> = ledger
            .positions(pool_id)
            .into_iter()
            .filter(|(_, position)| !position.debt_share.is_zero())
            .map(|(owner, _)| owner)
            .collect();
        owners
            .iter()
            .map(|owner| self.settle_position(ledger, pool_id, owner))
            .collect()
    }

    /// Release the collateral of a debt-free position after shutdown
    pub fn redeem_locked_collateral(
        &mut self,
        ledger: &mut Ledger,
        caller: &Address,
        pool_id: &PoolId,
        position_owner: &Address,
        recipient: &Address,
        data: &[u8],
    ) -> Result<Wad> {
        if !self.phase.is_caged() || ledger.is_live() {
            return Err(Error::NotCaged);
        }
        if !ledger.can_modify(position_owner, caller) {
            return Err(Error::NotAllowed {
                owner: position_owner.to_hex(),
                caller: caller.to_hex(),
            });
        }
        validate_address(recipient, "recipient")?;

        let adapter = ledger.pool(pool_id)?.adapter.clone();
        let position = ledger.position(pool_id, position_owner);
        if !position.debt_share.is_zero() {
            return Err(Error::PositionHasDebt);
        }
        validate_non_zero_wad(position.locked_collateral)?;
        let amount = position.locked_collateral;
        let collateral_delta = signed(amount)?;
        let address = self.address;
        let debt_engine = self.debt_engine;

        ledger.atomically(|l| {
            l.confiscate_position(&address, pool_id, position_owner, recipient, &debt_engine, -collateral_delta, 0)?;
            l.emit(ProtocolEvent::LockedCollateralRedeemed(LockedCollateralRedeemedEvent {
                pool: *pool_id,
                position_owner: *position_owner,
                recipient: *recipient,
                amount,
            }));
            Ok(())
        })?;

        if let Some(adapter) = &adapter {
            let released = AdapterMove {
                pool: *pool_id,
                src: *position_owner,
                dst: *recipient,
                amount,
            };
            notify_committed(&**adapter, &[(released, data)]);
        }
        tracing::info!(pool = %pool_id, owner = %position_owner.short(), %amount, "locked collateral redeemed");
        Ok(amount)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FINALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record outstanding stablecoin once the cooldown has elapsed and the
    /// debt engine holds no surplus
    pub fn finalize_debt(&mut self, ledger: &mut Ledger, now: u64) -> Result<()> {
        match self.phase {
            GlobalPhase::Active => return Err(Error::NotCaged),
            GlobalPhase::DebtFinalized { .. } => return Err(Error::DebtAlreadyFinalized),
            GlobalPhase::Caged { .. } => {}
        }
        let surplus = ledger.stablecoin(&self.debt_engine);
        if !surplus.is_zero() {
            return Err(Error::SurplusNotZero(surplus.to_string()));
        }
        let total_debt = ledger.total_stablecoin_issued();
        if total_debt.is_zero() {
            return Err(Error::ZeroTotalDebt);
        }

        self.phase = self.phase.finalize_debt(now, total_debt)?;
        ledger.emit(ProtocolEvent::DebtFinalized(DebtFinalizedEvent { total_debt }));
        tracing::info!(%total_debt, "total debt finalized");
        Ok(())
    }

    /// Fix the collateral paid per stablecoin redeemed against `pool`.
    ///
    /// Every indebted position of the pool must have been settled first, so
    /// the engine holds all the collateral the cash price pays out.
    pub fn finalize_cash_price(&mut self, ledger: &mut Ledger, pool_id: &PoolId) -> Result<Ray> {
        let total_debt = self.phase.total_debt().ok_or(Error::DebtNotFinalized)?;
        let label = pool_id.label();
        let phase = *self.pool_entry(pool_id)?;
        if phase.cash_price().is_some() {
            return Err(Error::CashPriceAlreadyDefined(label));
        }
        if !ledger.pool(pool_id)?.total_debt_share.is_zero() {
            return Err(Error::PoolNotSettled(label));
        }

        let covered = phase
            .debt_at_cage()
            .mul_ray_to_wad(phase.cage_price())?
            .checked_sub(phase.gap())?;
        let scaled = mul_div(
            U256::from(covered.raw()),
            U256::from(RAY) * U256::from(RAY),
            total_debt.raw(),
        )
        .ok_or_else(|| Error::Overflow {
            operation: "cash price".into(),
        })?;
        if scaled > U256::from(u128::MAX) {
            return Err(Error::Overflow {
                operation: "cash price".into(),
            });
        }
        let cash_price = Ray::from_raw(scaled.as_u128());

        self.pools.insert(*pool_id, phase.finalize(cash_price, &label)?);
        ledger.emit(ProtocolEvent::CashPriceFinalized(CashPriceFinalizedEvent {
            pool: *pool_id,
            cash_price,
        }));
        tracing::info!(pool = %pool_id, %cash_price, "cash price finalized");
        Ok(cash_price)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REDEMPTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Lock `amount` of the caller's stablecoin for redemption.
    ///
    /// The caller must have whitelisted the engine on the ledger.
    pub fn accumulate_stablecoin(&mut self, ledger: &mut Ledger, caller: &Address, amount: Wad) -> Result<Wad> {
        if self.phase.total_debt().is_none() {
            return Err(Error::DebtNotFinalized);
        }
        validate_non_zero_wad(amount)?;
        let total = self.accumulated(caller).checked_add(amount)?;

        let address = self.address;
        let debt_engine = self.debt_engine;
        ledger.atomically(|l| {
            l.move_stablecoin(&address, caller, &debt_engine, amount.to_rad())?;
            l.emit(ProtocolEvent::StablecoinAccumulated(StablecoinAccumulatedEvent {
                owner: *caller,
                amount,
                total,
            }));
            Ok(())
        })?;

        self.accumulator.insert(*caller, total);
        tracing::debug!(owner = %caller.short(), %amount, %total, "stablecoin accumulated");
        Ok(total)
    }

    /// Redeem accumulated stablecoin for collateral of `pool` at its cash price
    pub fn redeem_stablecoin(&mut self, ledger: &mut Ledger, caller: &Address, pool_id: &PoolId, amount: Wad) -> Result<Wad> {
        let cash_price = self
            .cash_price(pool_id)
            .ok_or_else(|| Error::CashPriceNotDefined(pool_id.label()))?;
        validate_non_zero_wad(amount)?;

        let redeemed = self.redeemed(pool_id, caller).checked_add(amount)?;
        let available = self.accumulated(caller);
        if redeemed > available {
            return Err(Error::InsufficientAccumulator {
                requested: redeemed.to_string(),
                available: available.to_string(),
            });
        }

        let collateral = cash_price.apply(amount)?;
        let address = self.address;
        ledger.atomically(|l| {
            if !collateral.is_zero() {
                l.move_collateral(&address, pool_id, &address, caller, collateral)?;
            }
            l.emit(ProtocolEvent::StablecoinRedeemed(StablecoinRedeemedEvent {
                pool: *pool_id,
                owner: *caller,
                amount,
                collateral,
            }));
            Ok(())
        })?;

        self.redeemed.insert((*pool_id, *caller), redeemed);
        tracing::debug!(pool = %pool_id, owner = %caller.short(), %amount, %collateral, "stablecoin redeemed");
        Ok(collateral)
    }
}

fn signed(amount: Wad) -> Result<i128> {
    amount
        .to_signed()
        .ok_or_else(|| Error::CollateralAmountOverflow(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleRegistry;
    use crate::core::debt_engine::SystemDebtEngine;
    use crate::core::pool::PoolConfig;
    use crate::oracle::{PriceOracle, SimplePriceFeed};
    use crate::utils::constants::{WAD, WEEK_SECS};
    use crate::utils::math::Rad;
    use std::sync::Arc;

    const W: i128 = WAD as i128;

    struct Fixture {
        ledger: Ledger,
        settlement: SettlementEngine,
        oracle: PriceOracle,
        debt_engine: SystemDebtEngine,
        feed: Arc<SimplePriceFeed>,
        owner: Address,
        alice: Address,
        bob: Address,
        pool: PoolId,
    }

    /// alice: 20 locked / 5 debt, bob: 10 locked / 8 debt, price 1
    fn fixture() -> Fixture {
        let owner = Address::derive("owner");
        let settlement_addr = Address::derive("settlement");
        let oracle_addr = Address::derive("oracle");
        let debt_engine_addr = Address::derive("debt-engine");

        let registry = Arc::new(RoleRegistry::new(owner));
        for (role, account) in [
            (Role::Adapter, owner),
            (Role::Settlement, settlement_addr),
            (Role::PriceOracle, oracle_addr),
            (Role::DebtEngine, debt_engine_addr),
        ] {
            registry.grant_role(&owner, role, account).unwrap();
        }

        let mut ledger = Ledger::new(registry);
        let feed = Arc::new(SimplePriceFeed::new(Wad::ONE, 30 * WEEK_SECS));
        let pool = PoolId::from_label("WXDC").unwrap();
        ledger
            .initialize_pool(
                &owner,
                pool,
                PoolConfig {
                    debt_ceiling: Rad::from_units(1_000),
                    position_debt_ceiling: Rad::from_units(1_000),
                    ..PoolConfig::default()
                }
                .with_price_feed(feed.clone()),
            )
            .unwrap();
        ledger.set_total_debt_ceiling(&owner, Rad::from_units(10_000)).unwrap();
        let oracle = PriceOracle::new(oracle_addr);
        oracle.set_price(&mut ledger, &pool).unwrap();

        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        for (who, locked, debt) in [(alice, 20, 5), (bob, 10, 8)] {
            ledger.add_collateral(&owner, &pool, &who, locked * W).unwrap();
            ledger
                .adjust_position(&who, &pool, &who, &who, &who, locked * W, debt * W)
                .unwrap();
            ledger.whitelist(&who, settlement_addr).unwrap();
        }

        Fixture {
            ledger,
            settlement: SettlementEngine::new(settlement_addr, debt_engine_addr),
            oracle,
            debt_engine: SystemDebtEngine::new(debt_engine_addr),
            feed,
            owner,
            alice,
            bob,
            pool,
        }
    }

    fn cage(f: &mut Fixture, now: u64) {
        let owner = f.owner;
        let mut components: [&mut dyn Cageable; 2] = [&mut f.oracle, &mut f.debt_engine];
        f.settlement
            .cage(&mut f.ledger, &owner, WEEK_SECS, now, &mut components)
            .unwrap();
    }

    #[test]
    fn test_cage_requires_owner_and_valid_cooldown() {
        let mut f = fixture();
        let alice = f.alice;
        assert!(f.settlement.cage(&mut f.ledger, &alice, WEEK_SECS, 0, &mut []).is_err());
        let owner = f.owner;
        assert!(matches!(
            f.settlement.cage(&mut f.ledger, &owner, 60, 0, &mut []),
            Err(Error::InvalidCooldown { .. })
        ));
        assert!(f.ledger.is_live());

        cage(&mut f, 1_000);
        assert!(!f.ledger.is_live());
        assert!(!f.oracle.is_live());
        assert!(!f.debt_engine.is_live());
        assert_eq!(f.settlement.phase().deadline(), Some(1_000 + WEEK_SECS));
        assert!(matches!(
            f.settlement.cage(&mut f.ledger, &owner, WEEK_SECS, 2_000, &mut []),
            Err(Error::AlreadyCaged)
        ));
    }

    #[test]
    fn test_cage_pool_before_global_cage_fails() {
        let mut f = fixture();
        let pool = f.pool;
        assert!(matches!(
            f.settlement.cage_pool(&mut f.ledger, &pool, &f.oracle),
            Err(Error::NotCaged)
        ));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut f = fixture();
        let (pool, alice, bob) = (f.pool, f.alice, f.bob);
        cage(&mut f, 1_000);

        f.feed.set_price(Wad::from_raw(WAD / 2)).unwrap();
        let cage_price = f.settlement.cage_pool(&mut f.ledger, &pool, &f.oracle).unwrap();
        assert_eq!(cage_price, Ray::from_bps(20_000));
        assert!(matches!(
            f.settlement.cage_pool(&mut f.ledger, &pool, &f.oracle),
            Err(Error::PoolAlreadyCaged(_))
        ));

        // alice owes 10 of 20, bob owes 16 of 10
        assert!(matches!(
            f.settlement
                .redeem_locked_collateral(&mut f.ledger, &alice, &pool, &alice, &alice, &[]),
            Err(Error::PositionHasDebt)
        ));
        let settled = f.settlement.settle_all_positions(&mut f.ledger, &pool).unwrap();
        assert_eq!(settled.len(), 2);
        assert_eq!(f.settlement.pool_phase(&pool).unwrap().gap(), Wad::from_units(6));
        assert_eq!(f.ledger.collateral_token(&pool, &f.settlement.address()), Wad::from_units(20));

        let released = f
            .settlement
            .redeem_locked_collateral(&mut f.ledger, &alice, &pool, &alice, &alice, &[])
            .unwrap();
        assert_eq!(released, Wad::from_units(10));
        assert_eq!(f.ledger.collateral_token(&pool, &alice), Wad::from_units(10));

        assert!(matches!(
            f.settlement.finalize_cash_price(&mut f.ledger, &pool),
            Err(Error::DebtNotFinalized)
        ));
        assert!(matches!(
            f.settlement.finalize_debt(&mut f.ledger, 1_000),
            Err(Error::CooldownNotElapsed { .. })
        ));
        f.settlement.finalize_debt(&mut f.ledger, 1_000 + WEEK_SECS).unwrap();
        assert!(matches!(
            f.settlement.finalize_debt(&mut f.ledger, 1_000 + WEEK_SECS),
            Err(Error::DebtAlreadyFinalized)
        ));

        // (13 * 2 - 6) / 13
        let cash = f.settlement.finalize_cash_price(&mut f.ledger, &pool).unwrap();
        assert_eq!(cash, Ray::from_raw(20 * RAY / 13));
        assert!(matches!(
            f.settlement.finalize_cash_price(&mut f.ledger, &pool),
            Err(Error::CashPriceAlreadyDefined(_))
        ));
        assert!(f.settlement.settle_position(&mut f.ledger, &pool, &alice).is_err());

        f.settlement
            .accumulate_stablecoin(&mut f.ledger, &alice, Wad::from_units(5))
            .unwrap();
        f.settlement
            .accumulate_stablecoin(&mut f.ledger, &bob, Wad::from_units(8))
            .unwrap();
        let a = f
            .settlement
            .redeem_stablecoin(&mut f.ledger, &alice, &pool, Wad::from_units(5))
            .unwrap();
        let b = f
            .settlement
            .redeem_stablecoin(&mut f.ledger, &bob, &pool, Wad::from_units(8))
            .unwrap();
        assert!(a.checked_add(b).unwrap() <= Wad::from_units(20));
        assert!(matches!(
            f.settlement.redeem_stablecoin(&mut f.ledger, &bob, &pool, Wad::ONE),
            Err(Error::InsufficientAccumulator { .. })
        ));
    }

    #[test]
    fn test_finalize_debt_requires_no_surplus() {
        let mut f = fixture();
        let (alice, engine) = (f.alice, f.debt_engine.address());
        cage(&mut f, 0);
        // surplus sent to the debt engine after its cage
        f.ledger
            .move_stablecoin(&alice, &alice, &engine, Rad::from_units(1))
            .unwrap();
        assert!(matches!(
            f.settlement.finalize_debt(&mut f.ledger, WEEK_SECS),
            Err(Error::SurplusNotZero(_))
        ));
    }

    #[test]
    fn test_accumulate_needs_whitelist() {
        let mut f = fixture();
        let (pool, alice, owner) = (f.pool, f.alice, f.owner);
        cage(&mut f, 0);
        f.settlement.cage_pool(&mut f.ledger, &pool, &f.oracle).unwrap();
        f.settlement.settle_all_positions(&mut f.ledger, &pool).unwrap();
        f.settlement.finalize_debt(&mut f.ledger, WEEK_SECS).unwrap();

        f.ledger.blacklist(&alice, f.settlement.address()).unwrap();
        assert!(matches!(
            f.settlement.accumulate_stablecoin(&mut f.ledger, &alice, Wad::ONE),
            Err(Error::NotAllowed { .. })
        ));
        assert_eq!(f.settlement.accumulated(&alice), Wad::ZERO);
        assert!(matches!(
            f.settlement.redeem_stablecoin(&mut f.ledger, &owner, &pool, Wad::ONE),
            Err(Error::CashPriceNotDefined(_))
        ));
    }

    #[test]
    fn test_cash_price_waits_for_every_position() {
        let mut f = fixture();
        let (pool, alice, bob) = (f.pool, f.alice, f.bob);
        cage(&mut f, 1_000);
        f.feed.set_price(Wad::from_raw(WAD / 2)).unwrap();
        f.settlement.cage_pool(&mut f.ledger, &pool, &f.oracle).unwrap();
        f.settlement.settle_position(&mut f.ledger, &pool, &alice).unwrap();
        f.settlement.finalize_debt(&mut f.ledger, 1_000 + WEEK_SECS).unwrap();

        assert!(matches!(
            f.settlement.finalize_cash_price(&mut f.ledger, &pool),
            Err(Error::PoolNotSettled(_))
        ));
        assert_eq!(f.settlement.cash_price(&pool), None);

        // bob can still be settled, after which the price covers both holders
        f.settlement.settle_position(&mut f.ledger, &pool, &bob).unwrap();
        let cash = f.settlement.finalize_cash_price(&mut f.ledger, &pool).unwrap();
        assert_eq!(cash, Ray::from_raw(20 * RAY / 13));

        f.settlement
            .accumulate_stablecoin(&mut f.ledger, &alice, Wad::from_units(5))
            .unwrap();
        f.settlement
            .accumulate_stablecoin(&mut f.ledger, &bob, Wad::from_units(8))
            .unwrap();
        f.settlement
            .redeem_stablecoin(&mut f.ledger, &alice, &pool, Wad::from_units(5))
            .unwrap();
        f.settlement
            .redeem_stablecoin(&mut f.ledger, &bob, &pool, Wad::from_units(8))
            .unwrap();
    }

    #[test]
    fn test_cage_price_uses_oracle_reference() {
        let mut f = fixture();
        let (pool, owner) = (f.pool, f.owner);
        f.oracle
            .set_stable_coin_reference_price(&mut f.ledger, &owner, Ray::from_bps(12_500))
            .unwrap();
        cage(&mut f, 1_000);
        f.feed.set_price(Wad::from_raw(WAD / 2)).unwrap();

        // 1.25 / 0.5
        let cage_price = f.settlement.cage_pool(&mut f.ledger, &pool, &f.oracle).unwrap();
        assert_eq!(cage_price, Ray::from_bps(25_000));
    }
}
