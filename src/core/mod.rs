//! Core modules for the stablecoin protocol.
//!
//! This module contains the fundamental building blocks:
//! - Identifiers (addresses, pool ids)
//! - Pool parameters and debt positions
//! - Collateral custody adapters
//! - The system debt engine (treasury)
//! - Protocol configuration

pub mod adapter;
pub mod config;
pub mod debt_engine;
pub mod pool;
pub mod position;
pub mod types;

pub use adapter::*;
pub use config::*;
pub use debt_engine::*;
pub use pool::*;
pub use position::*;
pub use types::*;
