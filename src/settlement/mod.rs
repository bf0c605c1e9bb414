//! Emergency shutdown and pro-rata redemption.
//!
//! Shutdown freezes the ledger and every component implementing
//! [`Cageable`], snapshots a cage price per pool, cleans indebted positions at
//! that price and finally lets stablecoin holders redeem collateral at a
//! per-pool cash price.

pub mod engine;
pub mod phase;

pub use engine::*;
pub use phase::*;

use crate::core::types::Address;
use crate::error::Result;
use crate::ledger::Ledger;

/// Component that global settlement shuts down
pub trait Cageable {
    /// Component name used in events and logs
    fn component(&self) -> &'static str;

    /// Whether the component still accepts operations
    fn is_live(&self) -> bool;

    /// Stop the component permanently; fails with `AlreadyCaged` on a second call
    fn cage(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()>;
}
