//! Flash-lending callbacks.
//!
//! A collateral recipient registered here receives its seized collateral
//! before the liquidator's stablecoin is pulled, and gets one synchronous call
//! to turn that collateral into the owed stablecoin. The call runs inside the
//! liquidation transaction: if the repayment is not in the liquidator's
//! balance when it returns, the whole liquidation rolls back.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::types::Address;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::utils::math::{Rad, Wad};

/// Callee invoked during a flash-lending liquidation
pub trait FlashLendingCallee: Send + Sync {
    /// Leave at least `debt_value` stablecoin in `liquidator`'s ledger balance
    fn flash_lending_call(
        &self,
        ledger: &mut Ledger,
        liquidator: &Address,
        debt_value: Rad,
        collateral_amount: Wad,
        data: &[u8],
    ) -> Result<()>;
}

/// Callees keyed by the collateral recipient address they act for
#[derive(Default, Clone)]
pub struct FlashLendingRegistry {
    callees: HashMap<Address, Arc<dyn FlashLendingCallee>>,
}

impl fmt::Debug for FlashLendingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlashLendingRegistry")
            .field("recipients", &self.callees.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FlashLendingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callee` for `recipient`, replacing any previous one
    pub fn register(&mut self, recipient: Address, callee: Arc<dyn FlashLendingCallee>) {
        self.callees.insert(recipient, callee);
    }

    /// Remove the callee of `recipient`
    pub fn unregister(&mut self, recipient: &Address) -> bool {
        self.callees.remove(recipient).is_some()
    }

    /// Callee for `recipient`
    pub fn get(&self, recipient: &Address) -> Option<Arc<dyn FlashLendingCallee>> {
        self.callees.get(recipient).cloned()
    }
}
