//! Stablecoin core simulator
//!
//! Runs a scripted lifecycle against a freshly configured engine: positions
//! are opened, fees accrue, the collateral price drops, an unsafe position is
//! liquidated, and the system is shut down and redeemed.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use stablecoin_core::prelude::*;
use stablecoin_core::utils::constants::WEEK_SECS;

/// Stablecoin core simulator
#[derive(Parser)]
#[command(name = "stablecoin-sim")]
#[command(version = stablecoin_core::VERSION)]
#[command(about = "Run a scripted lifecycle against the stablecoin core", long_about = None)]
struct Cli {
    /// Protocol configuration file (JSON); defaults when omitted
    #[arg(short, long, env = "STABLECOIN_CONFIG")]
    config: Option<PathBuf>,

    /// Write the final ledger snapshot here
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Print the event log as JSON
    #[arg(short, long)]
    events: bool,

    /// Collateral price after the drop
    #[arg(long, default_value = "0.6")]
    crash_price: String,

    /// Stability fee rate added to the pool rate, in bps
    #[arg(long, default_value_t = 100)]
    fee_bps: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ProtocolConfig::load(path)?.with_env_overrides()?,
        None => ProtocolConfig::from_env()?,
    };
    let settings = config
        .pools
        .first()
        .context("configuration has no pools")?
        .clone();
    let pool = settings.pool_id()?;
    let crash_price = Wad::from_decimal(cli.crash_price.parse().context("invalid crash price")?)?;

    let owner = Address::derive("sim/owner");
    let alice = Address::derive("sim/alice");
    let bob = Address::derive("sim/bob");

    let mut clock = chrono::Utc::now().timestamp().max(0) as u64;
    let mut height = 1;
    let mut engine = ProtocolEngine::from_config(&config, owner)?;
    engine
        .registry()
        .grant_role(&owner, Role::StabilityFeeCollector, owner)?;
    engine.begin_block(height, clock)?;

    // Open positions at 2x and ~3.3x collateralization
    open(&mut engine, pool, alice, Wad::from_units(1_000), Wad::from_units(500))?;
    open(&mut engine, pool, bob, Wad::from_units(2_000), Wad::from_units(600))?;
    info!(pool = %pool, issued = %engine.ledger().total_stablecoin_issued(), "positions opened");

    advance(&mut engine, &mut height, &mut clock, 3_600)?;
    engine.execute(
        &owner,
        Operation::AccrueStabilityFee {
            pool,
            rate_delta: Ray::from_bps(cli.fee_bps),
        },
    )?;

    advance(&mut engine, &mut height, &mut clock, 60)?;
    engine.set_feed_price(&pool, crash_price)?;
    engine.execute(&owner, Operation::UpdatePrices { pools: vec![pool] })?;

    let strategy = engine.addresses().liquidation_strategy;
    engine.execute(&bob, Operation::Whitelist { delegate: strategy })?;
    for candidate in engine.liquidation_engine().find_liquidatable(engine.ledger(), &pool)? {
        let position = engine.ledger().position(&pool, &candidate.owner);
        let request = LiquidationRequest {
            pool,
            position_owner: candidate.owner,
            debt_share_to_repay: position.debt_share,
            max_debt_share_to_repay: position.debt_share,
            liquidator: bob,
            collateral_recipient: bob,
            data: Vec::new(),
        };
        match engine.execute(&bob, Operation::Liquidate(request)) {
            Ok(OperationResult::Liquidation(result)) => info!(
                owner = %candidate.owner.short(),
                debt = %result.debt_value,
                collateral = %result.collateral_seized,
                "position liquidated"
            ),
            Ok(_) => {}
            Err(e) => info!(owner = %candidate.owner.short(), error = %e, "liquidation skipped"),
        }
    }
    engine.execute(&owner, Operation::SettleBadDebt)?;

    shutdown(&mut engine, &mut height, &mut clock, owner, pool)?;

    let settlement = engine.addresses().settlement;
    for holder in [alice, bob] {
        let balance = engine.ledger().stablecoin(&holder).div_ray(Ray::ONE)?;
        if balance.is_zero() {
            continue;
        }
        engine.execute(&holder, Operation::Whitelist { delegate: settlement })?;
        engine.execute(&holder, Operation::AccumulateStablecoin { amount: balance })?;
        if let OperationResult::Collateral(collateral) =
            engine.execute(&holder, Operation::RedeemStablecoin { pool, amount: balance })?
        {
            info!(holder = %holder.short(), stablecoin = %balance, %collateral, "stablecoin redeemed");
        }
    }

    if cli.events {
        let json = serde_json::to_string_pretty(engine.ledger().events().records())?;
        println!("{}", json);
    }
    if let Some(path) = &cli.snapshot {
        std::fs::write(path, engine.snapshot_bytes()?)
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
        info!(path = %path.display(), "snapshot written");
    }
    info!(
        events = engine.ledger().events().len(),
        digest = %engine.ledger().events().digest(),
        "simulation complete"
    );
    Ok(())
}

fn advance(engine: &mut ProtocolEngine, height: &mut u64, clock: &mut u64, secs: u64) -> anyhow::Result<()> {
    *height += 1;
    *clock += secs;
    engine.begin_block(*height, *clock)?;
    Ok(())
}

fn open(engine: &mut ProtocolEngine, pool: PoolId, who: Address, collateral: Wad, debt: Wad) -> anyhow::Result<()> {
    engine.deposit_collateral(&pool, &who, collateral)?;
    engine.execute(
        &who,
        Operation::AdjustPosition {
            pool,
            position_owner: who,
            collateral_owner: who,
            stablecoin_owner: who,
            collateral_delta: collateral.to_signed().context("collateral too large")?,
            debt_share_delta: debt.to_signed().context("debt too large")?,
        },
    )?;
    Ok(())
}

fn shutdown(
    engine: &mut ProtocolEngine,
    height: &mut u64,
    clock: &mut u64,
    owner: Address,
    pool: PoolId,
) -> anyhow::Result<()> {
    advance(engine, height, clock, 60)?;
    engine.execute(&owner, Operation::Cage { cooldown_secs: WEEK_SECS })?;
    engine.execute(&owner, Operation::CagePool { pool })?;

    let indebted: Vec<Address> = engine
        .ledger()
        .positions(&pool)
        .into_iter()
        .filter(|(_, position)| !position.debt_share.is_zero())
        .map(|(owner, _)| owner)
        .collect();
    for position_owner in indebted {
        engine.execute(&owner, Operation::SettlePosition { pool, owner: position_owner })?;
    }
    engine.execute(&owner, Operation::SettleBadDebt)?;

    advance(engine, height, clock, WEEK_SECS)?;
    engine.execute(&owner, Operation::FinalizeDebt)?;
    if let OperationResult::CashPrice(cash_price) =
        engine.execute(&owner, Operation::FinalizeCashPrice { pool })?
    {
        info!(pool = %pool, %cash_price, "cash price fixed");
    }
    Ok(())
}
