//! # Stablecoin Core
//!
//! Accounting and risk-control core of a collateralized-debt stablecoin.
//!
//! ## Architecture
//!
//! - **Ledger**: positions, free collateral, stablecoin balances, bad debt
//!   and the system-wide invariants tying them together
//! - **Oracle**: per-pool safety-margin prices derived from collateral feeds
//! - **Liquidation**: fixed-spread liquidation of unsafe positions, with an
//!   optional flash-lending callback
//! - **Settlement**: emergency shutdown that fixes a cash price per pool and
//!   lets holders redeem stablecoin for collateral
//! - **Protocol**: the operation set and the single-writer engine that runs it
//!
//! All amounts are fixed-point integers: [`utils::math::Wad`] (18 decimals),
//! [`utils::math::Ray`] (27) and [`utils::math::Rad`] (45).
//!
//! ## Example
//!
//! ```rust,ignore
//! use stablecoin_core::prelude::*;
//!
//! let owner = Address::derive("owner");
//! let mut engine = ProtocolEngine::from_config(&ProtocolConfig::default(), owner)?;
//! engine.begin_block(1, 1_700_000_000)?;
//! engine.execute(&owner, Operation::UpdatePrices { pools: engine.ledger().pool_ids() })?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod access;
pub mod core;
pub mod error;
pub mod ledger;
pub mod liquidation;
pub mod oracle;
pub mod protocol;
pub mod settlement;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::access::{AccessControl, Role, RoleRegistry};
    pub use crate::core::{
        adapter::{CollateralAdapter, RecordingAdapter},
        config::{PoolSettings, ProtocolConfig},
        debt_engine::SystemDebtEngine,
        pool::{Pool, PoolConfig, PoolParameter},
        position::Position,
        types::{Address, PoolId},
    };
    pub use crate::error::{Error, Result};
    pub use crate::ledger::Ledger;
    pub use crate::liquidation::{
        engine::LiquidationEngine,
        flash_lending::FlashLendingCallee,
        strategy::{FixedSpreadLiquidationStrategy, LiquidationInfo, LiquidationRequest},
    };
    pub use crate::oracle::{
        price_feed::{PriceFeed, SimplePriceFeed},
        price_oracle::PriceOracle,
    };
    pub use crate::protocol::{
        events::{EventRecord, ProtocolEvent},
        operations::{Component, Operation, OperationResult},
        state_machine::{ProtocolEngine, ProtocolHandle},
    };
    pub use crate::settlement::{engine::SettlementEngine, Cageable};
    pub use crate::utils::math::{Rad, Ray, Wad};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name used in logs
pub const PROTOCOL_NAME: &str = "stablecoin-core";
