//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use stablecoin_core::prelude::*;
use stablecoin_core::utils::constants::WAD;

pub const W: i128 = WAD as i128;

pub struct LedgerFixture {
    pub ledger: Ledger,
    pub registry: Arc<RoleRegistry>,
    pub owner: Address,
    pub oracle: Address,
    pub confiscator: Address,
    pub pool: PoolId,
}

/// Bare ledger with one pool priced at `spot`
pub fn ledger_fixture(spot: Ray, debt_floor: Rad) -> LedgerFixture {
    let owner = Address::derive("owner");
    let oracle = Address::derive("oracle");
    let confiscator = Address::derive("confiscator");
    let registry = Arc::new(RoleRegistry::new(owner));
    registry.grant_role(&owner, Role::Adapter, owner).unwrap();
    registry.grant_role(&owner, Role::PriceOracle, oracle).unwrap();
    registry
        .grant_role(&owner, Role::LiquidationEngine, confiscator)
        .unwrap();

    let mut ledger = Ledger::new(registry.clone());
    let pool = PoolId::from_label("WXDC").unwrap();
    ledger
        .initialize_pool(
            &owner,
            pool,
            PoolConfig {
                debt_ceiling: Rad::from_units(1_000_000_000),
                debt_floor,
                position_debt_ceiling: Rad::from_units(1_000_000_000),
                ..PoolConfig::default()
            },
        )
        .unwrap();
    ledger
        .set_total_debt_ceiling(&owner, Rad::from_units(1_000_000_000))
        .unwrap();
    ledger.set_price_with_safety_margin(&oracle, &pool, spot).unwrap();

    LedgerFixture {
        ledger,
        registry,
        owner,
        oracle,
        confiscator,
        pool,
    }
}

/// Deposit and lock `collateral`, drawing `debt` shares
pub fn open(engine: &mut ProtocolEngine, pool: PoolId, who: Address, collateral: i128, debt: i128) {
    engine
        .deposit_collateral(&pool, &who, Wad::from_raw(collateral as u128))
        .unwrap();
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

/// Engine from a config with the given pools; liquidation ratio 1, floor 10
pub fn engine_with_pools(labels: &[&str]) -> (ProtocolEngine, Vec<PoolId>) {
    let mut config = ProtocolConfig::default();
    config.pools = labels
        .iter()
        .map(|label| {
            let mut settings = PoolSettings::new(*label);
            settings.liquidation_ratio = 1.into();
            settings.debt_floor = 10.into();
            settings
        })
        .collect();
    let owner = Address::derive("owner");
    let mut engine = ProtocolEngine::from_config(&config, owner).unwrap();
    engine.begin_block(1, 1_000).unwrap();
    let pools = labels
        .iter()
        .map(|label| PoolId::from_label(label).unwrap())
        .collect();
    (engine, pools)
}
