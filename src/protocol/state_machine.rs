//! Protocol engine - single writer over all protocol state.
//!
//! The engine owns the ledger and every component acting on it. Operations
//! are executed strictly one after another, so a liquidation and a position
//! adjustment on the same position are always linearized. Shared access goes
//! through [`ProtocolHandle`], which serializes callers behind a mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::access::{Role, RoleRegistry};
use crate::core::adapter::RecordingAdapter;
use crate::core::config::{PoolSettings, ProtocolConfig};
use crate::core::debt_engine::SystemDebtEngine;
use crate::core::pool::PoolParameter;
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::liquidation::engine::LiquidationEngine;
use crate::liquidation::strategy::FixedSpreadLiquidationStrategy;
use crate::oracle::price_feed::SimplePriceFeed;
use crate::oracle::price_oracle::PriceOracle;
use crate::protocol::operations::{Component, Operation, OperationResult};
use crate::settlement::engine::SettlementEngine;
use crate::settlement::Cageable;
use crate::utils::math::{Ray, Wad};

// ═══════════════════════════════════════════════════════════════════════════════
// SYSTEM ADDRESSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Addresses the protocol components act as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemAddresses {
    /// Price safety oracle
    pub price_oracle: Address,
    /// Liquidation engine
    pub liquidation_engine: Address,
    /// Fixed-spread liquidation strategy
    pub liquidation_strategy: Address,
    /// System debt engine (treasury)
    pub debt_engine: Address,
    /// Settlement engine
    pub settlement: Address,
    /// Collateral adapter
    pub collateral_adapter: Address,
}

impl Default for SystemAddresses {
    fn default() -> Self {
        Self {
            price_oracle: Address::derive("system/price-oracle"),
            liquidation_engine: Address::derive("system/liquidation-engine"),
            liquidation_strategy: Address::derive("system/fixed-spread-strategy"),
            debt_engine: Address::derive("system/debt-engine"),
            settlement: Address::derive("system/settlement"),
            collateral_adapter: Address::derive("system/collateral-adapter"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Single owner of the ledger and all protocol components
#[derive(Debug)]
pub struct ProtocolEngine {
    owner: Address,
    addresses: SystemAddresses,
    registry: Arc<RoleRegistry>,
    ledger: Ledger,
    oracle: PriceOracle,
    liquidation: LiquidationEngine,
    debt_engine: SystemDebtEngine,
    settlement: SettlementEngine,
    feeds: HashMap<PoolId, Arc<SimplePriceFeed>>,
    adapters: HashMap<PoolId, Arc<RecordingAdapter>>,
    block_height: u64,
    timestamp: u64,
}

impl ProtocolEngine {
    /// Create an engine with no pools; `owner` holds the owner role
    pub fn new(owner: Address) -> Result<Self> {
        let addresses = SystemAddresses::default();
        let registry = Arc::new(RoleRegistry::new(owner));
        for (role, account) in [
            (Role::PriceOracle, addresses.price_oracle),
            (Role::LiquidationEngine, addresses.liquidation_engine),
            (Role::LiquidationEngine, addresses.liquidation_strategy),
            (Role::DebtEngine, addresses.debt_engine),
            (Role::Settlement, addresses.settlement),
            (Role::Adapter, addresses.collateral_adapter),
        ] {
            registry.grant_role(&owner, role, account)?;
        }

        let ledger = Ledger::new(registry.clone());
        let mut liquidation = LiquidationEngine::new(addresses.liquidation_engine);
        liquidation.register_strategy(
            &ledger,
            &owner,
            FixedSpreadLiquidationStrategy::new(addresses.liquidation_strategy, addresses.debt_engine),
        )?;

        Ok(Self {
            owner,
            addresses,
            registry,
            ledger,
            oracle: PriceOracle::new(addresses.price_oracle),
            liquidation,
            debt_engine: SystemDebtEngine::new(addresses.debt_engine),
            settlement: SettlementEngine::new(addresses.settlement, addresses.debt_engine),
            feeds: HashMap::new(),
            adapters: HashMap::new(),
            block_height: 0,
            timestamp: 0,
        })
    }

    /// Build an engine with every configured pool initialized and priced
    pub fn from_config(config: &ProtocolConfig, owner: Address) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(owner)?;

        let (reference, min, max) = config.reference_prices()?;
        engine.oracle = engine.oracle.clone().with_reference_band(min, max)?;
        if reference != engine.oracle.reference_price() {
            engine
                .oracle
                .set_stable_coin_reference_price(&mut engine.ledger, &owner, reference)?;
        }
        engine
            .ledger
            .set_total_debt_ceiling(&owner, config.total_debt_ceiling()?)?;
        if config.flash_lending_enabled {
            let strategy_address = engine.addresses.liquidation_strategy;
            if let Some(strategy) = engine.liquidation.strategy_mut(&strategy_address) {
                strategy.set_flash_lending_enabled(&engine.ledger, &owner, true)?;
            }
        }

        for settings in &config.pools {
            engine.add_pool(&owner, settings)?;
        }
        tracing::info!(pools = config.pools.len(), "protocol engine configured");
        Ok(engine)
    }

    /// Initialize a pool with its own feed and adapter, then price it
    pub fn add_pool(&mut self, caller: &Address, settings: &PoolSettings) -> Result<PoolId> {
        let pool_id = settings.pool_id()?;
        let feed = Arc::new(SimplePriceFeed::new(settings.initial_price()?, settings.price_max_age_secs));
        feed.advance_to(self.timestamp)?;
        feed.set_price(settings.initial_price()?)?;
        let adapter = Arc::new(RecordingAdapter::new());

        let config = settings
            .to_pool_config()?
            .with_price_feed(feed.clone())
            .with_adapter(adapter.clone())
            .with_strategy(self.addresses.liquidation_strategy);
        self.ledger.initialize_pool(caller, pool_id, config)?;
        self.oracle.set_price(&mut self.ledger, &pool_id)?;

        self.feeds.insert(pool_id, feed);
        self.adapters.insert(pool_id, adapter);
        Ok(pool_id)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BLOCK PROCESSING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Enter a new block; events are stamped with it and feeds age to `timestamp`
    pub fn begin_block(&mut self, height: u64, timestamp: u64) -> Result<()> {
        self.block_height = height;
        self.timestamp = timestamp;
        self.ledger.set_block(height, timestamp);
        for feed in self.feeds.values() {
            feed.advance_to(timestamp)?;
        }
        Ok(())
    }

    /// Publish a new feed price for `pool` at the current timestamp
    pub fn set_feed_price(&mut self, pool: &PoolId, price: Wad) -> Result<()> {
        self.feed(pool)?.set_price(price)
    }

    /// Credit free collateral deposited through the collateral adapter
    pub fn deposit_collateral(&mut self, pool: &PoolId, owner: &Address, amount: Wad) -> Result<()> {
        let amount = amount
            .to_signed()
            .ok_or_else(|| Error::CollateralAmountOverflow(amount.to_string()))?;
        let adapter = self.addresses.collateral_adapter;
        self.ledger.add_collateral(&adapter, pool, owner, amount)
    }

    /// Governance update of one pool parameter
    pub fn update_pool(&mut self, caller: &Address, pool: &PoolId, parameter: PoolParameter) -> Result<()> {
        self.ledger.update_pool(caller, pool, parameter)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OPERATION EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Execute one operation on behalf of `caller`
    pub fn execute(&mut self, caller: &Address, op: Operation) -> Result<OperationResult> {
        let operation = op.operation_type();
        let result = self.dispatch(caller, op);
        match &result {
            Ok(_) => tracing::debug!(operation, caller = %caller.short(), "operation executed"),
            Err(err) => tracing::warn!(
                operation,
                caller = %caller.short(),
                code = err.code(),
                error = %err,
                "operation failed"
            ),
        }
        result
    }

    fn dispatch(&mut self, caller: &Address, op: Operation) -> Result<OperationResult> {
        let done = |_: ()| OperationResult::Done;
        match op {
            Operation::AddCollateral { pool, owner, amount } => {
                self.ledger.add_collateral(caller, &pool, &owner, amount).map(done)
            }
            Operation::MoveCollateral { pool, src, dst, amount } => {
                self.ledger.move_collateral(caller, &pool, &src, &dst, amount).map(done)
            }
            Operation::MoveStablecoin { src, dst, value } => {
                self.ledger.move_stablecoin(caller, &src, &dst, value).map(done)
            }
            Operation::AdjustPosition {
                pool,
                position_owner,
                collateral_owner,
                stablecoin_owner,
                collateral_delta,
                debt_share_delta,
            } => self
                .ledger
                .adjust_position(
                    caller,
                    &pool,
                    &position_owner,
                    &collateral_owner,
                    &stablecoin_owner,
                    collateral_delta,
                    debt_share_delta,
                )
                .map(done),
            Operation::MovePosition {
                pool,
                src,
                dst,
                collateral_delta,
                debt_share_delta,
            } => self
                .ledger
                .move_position(caller, &pool, &src, &dst, collateral_delta, debt_share_delta)
                .map(done),
            Operation::Whitelist { delegate } => self.ledger.whitelist(caller, delegate).map(done),
            Operation::Blacklist { delegate } => self.ledger.blacklist(caller, delegate).map(done),
            Operation::AccrueStabilityFee { pool, rate_delta } => {
                let recipient = self.addresses.debt_engine;
                self.ledger
                    .accrue_stability_fee(caller, &pool, &recipient, rate_delta)
                    .map(done)
            }
            Operation::SetTotalDebtCeiling { value } => {
                self.ledger.set_total_debt_ceiling(caller, value).map(done)
            }
            Operation::UpdatePrices { pools } => self
                .oracle
                .set_prices(&mut self.ledger, &pools)
                .map(OperationResult::Prices),
            Operation::SetReferencePrice { value } => self
                .oracle
                .set_stable_coin_reference_price(&mut self.ledger, caller, value)
                .map(done),
            Operation::Liquidate(request) => self
                .liquidation
                .liquidate(&mut self.ledger, caller, &request)
                .map(OperationResult::Liquidation),
            Operation::SettleBadDebt => self
                .debt_engine
                .settle_max(&mut self.ledger)
                .map(OperationResult::Netted),
            Operation::Pause(component) => self.set_paused(caller, component, true).map(done),
            Operation::Unpause(component) => self.set_paused(caller, component, false).map(done),
            Operation::Cage { cooldown_secs } => {
                let mut components: [&mut dyn Cageable; 3] =
                    [&mut self.oracle, &mut self.liquidation, &mut self.debt_engine];
                self.settlement
                    .cage(&mut self.ledger, caller, cooldown_secs, self.timestamp, &mut components)
                    .map(done)
            }
            Operation::CagePool { pool } => self
                .settlement
                .cage_pool(&mut self.ledger, &pool, &self.oracle)
                .map(OperationResult::CagePrice),
            Operation::SettlePosition { pool, owner } => self
                .settlement
                .settle_position(&mut self.ledger, &pool, &owner)
                .map(OperationResult::PositionSettled),
            Operation::RedeemLockedCollateral {
                pool,
                position_owner,
                recipient,
                data,
            } => self
                .settlement
                .redeem_locked_collateral(&mut self.ledger, caller, &pool, &position_owner, &recipient, &data)
                .map(OperationResult::Collateral),
            Operation::FinalizeDebt => self
                .settlement
                .finalize_debt(&mut self.ledger, self.timestamp)
                .map(done),
            Operation::FinalizeCashPrice { pool } => self
                .settlement
                .finalize_cash_price(&mut self.ledger, &pool)
                .map(OperationResult::CashPrice),
            Operation::AccumulateStablecoin { amount } => self
                .settlement
                .accumulate_stablecoin(&mut self.ledger, caller, amount)
                .map(OperationResult::Accumulated),
            Operation::RedeemStablecoin { pool, amount } => self
                .settlement
                .redeem_stablecoin(&mut self.ledger, caller, &pool, amount)
                .map(OperationResult::Collateral),
        }
    }

    fn set_paused(&mut self, caller: &Address, component: Component, paused: bool) -> Result<()> {
        match (component, paused) {
            (Component::Ledger, true) => self.ledger.pause(caller),
            (Component::Ledger, false) => self.ledger.unpause(caller),
            (Component::PriceOracle, true) => self.oracle.pause(&mut self.ledger, caller),
            (Component::PriceOracle, false) => self.oracle.unpause(&mut self.ledger, caller),
            (Component::LiquidationEngine, true) => self.liquidation.pause(&mut self.ledger, caller),
            (Component::LiquidationEngine, false) => self.liquidation.unpause(&mut self.ledger, caller),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Protocol owner
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Component addresses
    pub fn addresses(&self) -> &SystemAddresses {
        &self.addresses
    }

    /// Role registry
    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    /// Ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Price oracle
    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    /// Liquidation engine
    pub fn liquidation_engine(&self) -> &LiquidationEngine {
        &self.liquidation
    }

    /// Mutable liquidation engine (strategy administration)
    pub fn liquidation_engine_mut(&mut self) -> &mut LiquidationEngine {
        &mut self.liquidation
    }

    /// System debt engine
    pub fn debt_engine(&self) -> &SystemDebtEngine {
        &self.debt_engine
    }

    /// Settlement engine
    pub fn settlement(&self) -> &SettlementEngine {
        &self.settlement
    }

    /// Price feed of `pool`
    pub fn feed(&self, pool: &PoolId) -> Result<&Arc<SimplePriceFeed>> {
        self.feeds
            .get(pool)
            .ok_or_else(|| Error::MissingPriceFeed(pool.label()))
    }

    /// Collateral adapter of `pool`
    pub fn adapter(&self, pool: &PoolId) -> Option<&Arc<RecordingAdapter>> {
        self.adapters.get(pool)
    }

    /// Reference price
    pub fn reference_price(&self) -> Ray {
        self.oracle.reference_price()
    }

    /// Current block height
    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Current timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Serialized ledger state
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        self.ledger.snapshot().to_bytes()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Cloneable handle serializing access to one [`ProtocolEngine`]
#[derive(Debug, Clone)]
pub struct ProtocolHandle {
    inner: Arc<Mutex<ProtocolEngine>>,
}

impl ProtocolHandle {
    /// Wrap an engine
    pub fn new(engine: ProtocolEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Execute one operation
    pub fn execute(&self, caller: &Address, op: Operation) -> Result<OperationResult> {
        self.inner.lock().map_err(|_| Error::Lock)?.execute(caller, op)
    }

    /// Enter a new block
    pub fn begin_block(&self, height: u64, timestamp: u64) -> Result<()> {
        self.inner.lock().map_err(|_| Error::Lock)?.begin_block(height, timestamp)
    }

    /// Read engine state
    pub fn read<R>(&self, f: impl FnOnce(&ProtocolEngine) -> R) -> Result<R> {
        let engine = self.inner.lock().map_err(|_| Error::Lock)?;
        Ok(f(&engine))
    }

    /// Run `f` with exclusive access to the engine
    pub fn write<R>(&self, f: impl FnOnce(&mut ProtocolEngine) -> R) -> Result<R> {
        let mut engine = self.inner.lock().map_err(|_| Error::Lock)?;
        Ok(f(&mut engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidation::strategy::LiquidationRequest;
    use crate::utils::constants::WAD;
    use crate::utils::math::Rad;
    use std::thread;

    const W: i128 = WAD as i128;

    fn engine() -> (ProtocolEngine, PoolId) {
        let owner = Address::derive("owner");
        let engine = ProtocolEngine::from_config(&ProtocolConfig::default(), owner).unwrap();
        (engine, PoolId::from_label("WXDC").unwrap())
    }

    fn open(engine: &mut ProtocolEngine, pool: PoolId, who: Address, collateral: i128, debt: i128) {
        engine.deposit_collateral(&pool, &who, Wad::from_raw(collateral as u128)).unwrap();
        engine
            .execute(
                &who,
                Operation::AdjustPosition {
                    pool,
                    position_owner: who,
                    collateral_owner: who,
                    stablecoin_owner: who,
                    collateral_delta: collateral,
                    debt_share_delta: debt,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_engine_from_default_config() {
        let (engine, pool) = engine();
        let state = engine.ledger().pool(&pool).unwrap();
        // 1 / 1.33
        assert_eq!(state.price_with_safety_margin, Ray::from_raw(751_879_699_248_120_300_751_879_699));
        assert_eq!(engine.ledger().total_debt_ceiling(), Rad::from_units(10_000_000));
        assert!(engine.adapter(&pool).is_some());
    }

    #[test]
    fn test_begin_block_stamps_events() {
        let (mut engine, pool) = engine();
        engine.begin_block(7, 1_000).unwrap();
        open(&mut engine, pool, Address::derive("alice"), 1_000 * W, 500 * W);
        let last = engine.ledger().events().records().last().unwrap();
        assert_eq!(last.block_height, 7);
        assert_eq!(last.timestamp, 1_000);
    }

    #[test]
    fn test_liquidation_through_operations() {
        let (mut engine, pool) = engine();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        open(&mut engine, pool, alice, 1_000 * W, 500 * W);
        open(&mut engine, pool, bob, 2_000 * W, 600 * W);
        let strategy = engine.addresses().liquidation_strategy;
        engine.execute(&bob, Operation::Whitelist { delegate: strategy }).unwrap();

        engine.set_feed_price(&pool, Wad::from_raw(6 * WAD / 10)).unwrap();
        engine.execute(&bob, Operation::UpdatePrices { pools: vec![pool] }).unwrap();

        let request = LiquidationRequest {
            pool,
            position_owner: alice,
            debt_share_to_repay: Wad::from_units(500),
            max_debt_share_to_repay: Wad::from_units(500),
            liquidator: bob,
            collateral_recipient: bob,
            data: Vec::new(),
        };
        let result = engine.execute(&bob, Operation::Liquidate(request)).unwrap();
        let OperationResult::Liquidation(info) = result else {
            panic!("unexpected result {:?}", result);
        };
        // close factor 50%
        assert_eq!(info.debt_share_to_liquidate, Wad::from_units(250));
        assert_eq!(engine.ledger().position(&pool, &alice).debt_share, Wad::from_units(250));
        let adapter = engine.adapter(&pool).unwrap();
        assert_eq!(adapter.received_by(&bob), info.collateral_to_liquidator);
    }

    #[test]
    fn test_pause_blocks_and_resumes() {
        let (mut engine, pool) = engine();
        let owner = engine.owner();
        let alice = Address::derive("alice");
        engine.execute(&owner, Operation::Pause(Component::Ledger)).unwrap();
        engine.deposit_collateral(&pool, &alice, Wad::from_units(10)).unwrap_err();
        engine.execute(&owner, Operation::Unpause(Component::Ledger)).unwrap();
        engine.deposit_collateral(&pool, &alice, Wad::from_units(10)).unwrap();
        assert_eq!(engine.ledger().collateral_token(&pool, &alice), Wad::from_units(10));
    }

    #[test]
    fn test_handle_serializes_callers() {
        let (engine, pool) = engine();
        let handle = ProtocolHandle::new(engine);
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let handle = handle.clone();
                thread::spawn(move || {
                    let who = Address::derive(&format!("user-{}", i));
                    handle
                        .write(|engine| engine.deposit_collateral(&pool, &who, Wad::from_units(1_000)))
                        .unwrap()
                        .unwrap();
                    handle
                        .execute(
                            &who,
                            Operation::AdjustPosition {
                                pool,
                                position_owner: who,
                                collateral_owner: who,
                                stablecoin_owner: who,
                                collateral_delta: 1_000 * W,
                                debt_share_delta: 200 * W,
                            },
                        )
                        .unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let issued = handle.read(|engine| engine.ledger().total_stablecoin_issued()).unwrap();
        assert_eq!(issued, Rad::from_units(800));
    }
}
