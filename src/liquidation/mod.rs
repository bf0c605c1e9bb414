//! Liquidation of unsafe positions.
//!
//! - Fixed-spread strategy computing and executing one liquidation
//! - Liquidation engine checking positions and dispatching to the pool strategy
//! - Flash-lending callees settling repayment from seized collateral

pub mod engine;
pub mod flash_lending;
pub mod strategy;

pub use engine::*;
pub use flash_lending::*;
pub use strategy::*;
