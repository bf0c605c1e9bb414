//! Liquidation integration tests: calculation bounds, engine flow and the
//! flash-lending path.

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::{open, W};
use stablecoin_core::core::{
    Address, CollateralAdapter, PoolId, PoolParameter, PoolSettings, Position, ProtocolConfig,
    RecordingAdapter,
};
use stablecoin_core::error::Error;
use stablecoin_core::ledger::Ledger;
use stablecoin_core::liquidation::{
    calculate_liquidation, FlashLendingCallee, LiquidationParams, LiquidationRequest,
};
use stablecoin_core::protocol::{Operation, OperationResult, ProtocolEngine, ProtocolEvent};
use stablecoin_core::utils::constants::{RAY, WAD};
use stablecoin_core::utils::math::{Rad, Ray, Wad};

// ═══════════════════════════════════════════════════════════════════════════════
// CALCULATION
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_liquidation_respects_caps(
        position_units in 1u128..1_000_000,
        collateral_units in 1u128..10_000_000,
        wanted_units in 1u128..2_000_000,
        max_units in 1u128..2_000_000,
        price_cents in 1u128..10_000,
        rate_bps in 10_000u32..20_000,
        close_factor_bps in 1u32..=10_000,
        incentive_bps in 10_000u32..=15_000,
        treasury_bps in 0u32..=10_000,
        floor_units in 0u128..1_000,
    ) {
        let params = LiquidationParams {
            position_debt_share: Wad::from_units(position_units as u64),
            position_collateral: Wad::from_units(collateral_units as u64),
            debt_share_wanted: Wad::from_units(wanted_units as u64),
            max_debt_share_to_repay: Wad::from_units(max_units as u64),
            debt_accumulated_rate: Ray::from_bps(rate_bps),
            debt_floor: Rad::from_units(floor_units as u64),
            price: Wad::from_raw(price_cents * WAD / 100),
            close_factor_bps,
            liquidator_incentive_bps: incentive_bps,
            treasury_fees_bps: treasury_bps,
        };
        let close_cap = params.position_debt_share.mul_bps(close_factor_bps).unwrap();

        if let Ok(info) = calculate_liquidation(&params) {
            prop_assert!(info.debt_share_to_liquidate <= params.position_debt_share);
            prop_assert!(info.debt_share_to_liquidate <= params.max_debt_share_to_repay);
            if info.debt_share_to_liquidate != params.position_debt_share {
                prop_assert!(info.debt_share_to_liquidate <= close_cap);
                prop_assert!(info.debt_share_to_liquidate <= params.debt_share_wanted);
            }
            prop_assert!(info.collateral_seized <= params.position_collateral);
            prop_assert_eq!(
                info.collateral_to_liquidator.checked_add(info.treasury_fee).unwrap(),
                info.collateral_seized
            );
            prop_assert_eq!(info.debt_value, info.debt_share_to_liquidate.mul_ray(params.debt_accumulated_rate));
        }
    }
}

#[test]
fn test_reference_vector() {
    // 2 shares at rate 1, price 1, 5% bonus, 25% of the bonus to the treasury
    let info = calculate_liquidation(&LiquidationParams {
        position_debt_share: Wad::from_units(2),
        position_collateral: Wad::from_units(10),
        debt_share_wanted: Wad::from_units(2),
        max_debt_share_to_repay: Wad::from_units(2),
        debt_accumulated_rate: Ray::ONE,
        debt_floor: Rad::ZERO,
        price: Wad::ONE,
        close_factor_bps: 10_000,
        liquidator_incentive_bps: 10_500,
        treasury_fees_bps: 2_500,
    })
    .unwrap();
    assert_eq!(info.collateral_seized, Wad::from_raw(2_100_000_000_000_000_000));
    assert_eq!(info.treasury_fee, Wad::from_raw(25_000_000_000_000_000));
    assert_eq!(info.collateral_to_liquidator, Wad::from_raw(2_075_000_000_000_000_000));
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLASH LENDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Sells the seized collateral to a market account for stablecoin
struct MarketCallee {
    pool: PoolId,
    recipient: Address,
    market: Address,
    pay_bps: u32,
    fail: bool,
}

impl FlashLendingCallee for MarketCallee {
    fn flash_lending_call(
        &self,
        ledger: &mut Ledger,
        liquidator: &Address,
        debt_value: Rad,
        collateral_amount: Wad,
        _data: &[u8],
    ) -> stablecoin_core::error::Result<()> {
        if self.fail {
            return Err(Error::InvalidParameter {
                name: "data".into(),
                reason: "swap rejected".into(),
            });
        }
        ledger.move_collateral(&self.recipient, &self.pool, &self.recipient, &self.market, collateral_amount)?;
        ledger.move_stablecoin(&self.market, &self.market, liquidator, debt_value.mul_bps(self.pay_bps)?)
    }
}

struct FlashSetup {
    engine: ProtocolEngine,
    pool: PoolId,
    alice: Address,
    carol: Address,
    market: Address,
}

fn flash_setup(flash_enabled: bool, callee: Option<(u32, bool)>) -> FlashSetup {
    let mut settings = PoolSettings::new("WXDC");
    settings.liquidation_ratio = 1.into();
    settings.debt_floor = 10.into();
    let config = ProtocolConfig {
        flash_lending_enabled: flash_enabled,
        pools: vec![settings],
        ..ProtocolConfig::default()
    };
    let mut engine = ProtocolEngine::from_config(&config, Address::derive("owner")).unwrap();
    engine.begin_block(1, 1_000).unwrap();
    let pool = PoolId::from_label("WXDC").unwrap();

    let alice = Address::derive("alice");
    let carol = Address::derive("carol");
    let market = Address::derive("market");
    open(&mut engine, pool, alice, 100 * W, 80 * W);
    open(&mut engine, pool, market, 1_000 * W, 500 * W);

    let strategy = engine.addresses().liquidation_strategy;
    engine.execute(&carol, Operation::Whitelist { delegate: strategy }).unwrap();
    if let Some((pay_bps, fail)) = callee {
        engine
            .liquidation_engine_mut()
            .strategy_mut(&strategy)
            .unwrap()
            .register_flash_lending_callee(
                &carol,
                Arc::new(MarketCallee {
                    pool,
                    recipient: carol,
                    market,
                    pay_bps,
                    fail,
                }),
            );
    }

    engine.begin_block(2, 1_060).unwrap();
    engine.set_feed_price(&pool, Wad::from_raw(WAD / 2)).unwrap();
    engine.execute(&carol, Operation::UpdatePrices { pools: vec![pool] }).unwrap();

    FlashSetup {
        engine,
        pool,
        alice,
        carol,
        market,
    }
}

fn request(s: &FlashSetup) -> LiquidationRequest {
    LiquidationRequest {
        pool: s.pool,
        position_owner: s.alice,
        debt_share_to_repay: Wad::from_units(80),
        max_debt_share_to_repay: Wad::from_units(80),
        liquidator: s.carol,
        collateral_recipient: s.carol,
        data: b"swap".to_vec(),
    }
}

#[test]
fn test_flash_liquidation_repays_from_proceeds() {
    let mut s = flash_setup(true, Some((10_000, false)));
    let req = request(&s);
    let result = s.engine.execute(&s.carol, Operation::Liquidate(req)).unwrap();
    let OperationResult::Liquidation(info) = result else {
        panic!("unexpected result {:?}", result);
    };

    // close factor 50%: 40 repaid, 84 seized at price 0.5, bonus 4, fee 1
    assert_eq!(info.debt_share_to_liquidate, Wad::from_units(40));
    assert_eq!(info.collateral_seized, Wad::from_units(84));
    assert_eq!(info.treasury_fee, Wad::from_units(1));

    let ledger = s.engine.ledger();
    assert_eq!(ledger.collateral_token(&s.pool, &s.market), Wad::from_units(83));
    assert_eq!(ledger.stablecoin(&s.carol), Rad::ZERO);
    assert_eq!(ledger.stablecoin(&s.market), Rad::from_units(460));
    let strategy = s.engine.addresses().liquidation_strategy;
    let stats = s.engine.liquidation_engine().strategy(&strategy).unwrap().stats();
    assert_eq!(stats.flash_liquidations, 1);
}

#[test]
fn test_flash_short_payment_rolls_back() {
    let mut s = flash_setup(true, Some((5_000, false)));
    let events = s.engine.ledger().events().len();
    let req = request(&s);
    let err = s.engine.execute(&s.carol, Operation::Liquidate(req)).unwrap_err();
    assert!(matches!(err, Error::InsufficientStablecoin { .. }));

    let ledger = s.engine.ledger();
    assert_eq!(ledger.position(&s.pool, &s.alice).debt_share, Wad::from_units(80));
    assert_eq!(ledger.collateral_token(&s.pool, &s.market), Wad::ZERO);
    assert_eq!(ledger.stablecoin(&s.market), Rad::from_units(500));
    assert_eq!(ledger.events().len(), events);
}

#[test]
fn test_flash_callee_error_is_reported() {
    let mut s = flash_setup(true, Some((10_000, true)));
    let req = request(&s);
    let err = s.engine.execute(&s.carol, Operation::Liquidate(req)).unwrap_err();
    assert!(matches!(err, Error::FlashLendingFailed(_)));
    assert_eq!(s.engine.ledger().position(&s.pool, &s.alice).debt_share, Wad::from_units(80));
}

#[test]
fn test_flash_disabled_requires_funds() {
    let mut s = flash_setup(false, Some((10_000, false)));
    let req = request(&s);
    let err = s.engine.execute(&s.carol, Operation::Liquidate(req)).unwrap_err();
    assert!(matches!(err, Error::InsufficientStablecoin { .. }));
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE FLOW
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_liquidator_must_be_caller() {
    let mut s = flash_setup(false, None);
    let req = request(&s);
    let err = s.engine.execute(&s.market, Operation::Liquidate(req)).unwrap_err();
    assert!(matches!(err, Error::NotAllowed { .. }));
}

#[test]
fn test_rate_accrual_makes_position_unsafe() {
    let (mut engine, pools) = common::engine_with_pools(&["WXDC"]);
    let pool = pools[0];
    let owner = engine.owner();
    engine
        .registry()
        .grant_role(&owner, stablecoin_core::access::Role::StabilityFeeCollector, owner)
        .unwrap();
    let alice = Address::derive("alice");
    open(&mut engine, pool, alice, 100 * W, 100 * W);
    assert!(engine
        .liquidation_engine()
        .find_liquidatable(engine.ledger(), &pool)
        .unwrap()
        .is_empty());

    engine
        .execute(
            &owner,
            Operation::AccrueStabilityFee {
                pool,
                rate_delta: Ray::from_raw(RAY / 10),
            },
        )
        .unwrap();
    let candidates = engine
        .liquidation_engine()
        .find_liquidatable(engine.ledger(), &pool)
        .unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].owner, alice);
    assert_eq!(candidates[0].shortfall(), Rad::from_units(10));
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESIDUAL DEBT AND CUSTODY
// ═══════════════════════════════════════════════════════════════════════════════

/// alice 100/50 unsafe at price 0.4; bob funded and delegating to the strategy
fn crashed_pool() -> (ProtocolEngine, PoolId, Address, Address) {
    let (mut engine, pools) = common::engine_with_pools(&["WXDC"]);
    let pool = pools[0];
    let alice = Address::derive("alice");
    let bob = Address::derive("bob");
    open(&mut engine, pool, alice, 100 * W, 50 * W);
    open(&mut engine, pool, bob, 1_000 * W, 300 * W);
    let strategy = engine.addresses().liquidation_strategy;
    engine.execute(&bob, Operation::Whitelist { delegate: strategy }).unwrap();
    engine.set_feed_price(&pool, Wad::from_raw(4 * WAD / 10)).unwrap();
    engine.execute(&bob, Operation::UpdatePrices { pools: vec![pool] }).unwrap();
    (engine, pool, alice, bob)
}

fn liquidate_all(pool: PoolId, owner: Address, liquidator: Address) -> Operation {
    Operation::Liquidate(LiquidationRequest {
        pool,
        position_owner: owner,
        debt_share_to_repay: Wad::from_units(50),
        max_debt_share_to_repay: Wad::from_units(50),
        liquidator,
        collateral_recipient: liquidator,
        data: Vec::new(),
    })
}

#[test]
fn test_debt_without_collateral_is_written_off() {
    let (mut engine, pool, alice, bob) = crashed_pool();

    // close factor halves the debt twice; the third call runs out of collateral
    for _ in 0..3 {
        engine.execute(&bob, liquidate_all(pool, alice, bob)).unwrap();
    }

    assert_eq!(engine.ledger().position(&pool, &alice), Position::default());
    assert_eq!(engine.ledger().pool_stablecoin_issued(&pool), Rad::from_units(300));
    let debt_engine = engine.addresses().debt_engine;
    assert_eq!(engine.ledger().system_bad_debt(&debt_engine), Rad::from_units(50));

    let liquidations = engine.ledger().events().filter_by_type("Liquidation");
    let written_off: Vec<Wad> = liquidations
        .iter()
        .filter_map(|event| match event {
            ProtocolEvent::Liquidation(e) => Some(e.debt_share_written_off),
            _ => None,
        })
        .collect();
    assert_eq!(written_off.len(), 3);
    assert!(written_off[..2].iter().all(|w| w.is_zero()));
    // 12.5 owed, 1.5625 collateral covers 0.625 / 1.05 of it
    assert!(written_off[2] > Wad::from_units(11) && written_off[2] < Wad::from_units(12));
}

/// Custody adapter that refuses deliveries to one account
#[derive(Debug)]
struct RejectingAdapter {
    inner: RecordingAdapter,
    reject: Address,
}

impl CollateralAdapter for RejectingAdapter {
    fn on_move_collateral(
        &self,
        pool: &PoolId,
        src: &Address,
        dst: &Address,
        amount: Wad,
        data: &[u8],
    ) -> stablecoin_core::error::Result<()> {
        if *dst == self.reject {
            return Err(Error::Lock);
        }
        self.inner.on_move_collateral(pool, src, dst, amount, data)
    }
}

#[test]
fn test_adapter_failure_does_not_split_the_liquidation() {
    let (mut engine, pool, alice, bob) = crashed_pool();
    let owner = engine.owner();
    let adapter = Arc::new(RejectingAdapter {
        inner: RecordingAdapter::new(),
        reject: engine.addresses().debt_engine,
    });
    engine
        .update_pool(&owner, &pool, PoolParameter::Adapter(adapter.clone()))
        .unwrap();

    let result = engine.execute(&bob, liquidate_all(pool, alice, bob)).unwrap();
    let OperationResult::Liquidation(info) = result else {
        panic!("unexpected result {:?}", result);
    };
    assert!(!info.treasury_fee.is_zero());
    assert_eq!(engine.ledger().position(&pool, &alice).debt_share, Wad::from_units(25));
    // the recipient was told even though the treasury notification failed
    assert_eq!(adapter.inner.received_by(&bob), info.collateral_to_liquidator);
    assert_eq!(adapter.inner.moves().len(), 1);

    // a rolled back liquidation reaches no adapter
    let strategy = engine.addresses().liquidation_strategy;
    engine.execute(&bob, Operation::Blacklist { delegate: strategy }).unwrap();
    assert!(engine.execute(&bob, liquidate_all(pool, alice, bob)).is_err());
    assert_eq!(adapter.inner.moves().len(), 1);
}
