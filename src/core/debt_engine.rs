//! System debt engine (treasury).
//!
//! Receives liquidation repayments and treasury fees as protocol surplus and
//! carries the bad debt booked by confiscations. Netting the two is open to
//! anyone; moving surplus out is owner-only.

use serde::{Deserialize, Serialize};

use crate::access::{ensure_any_role, ensure_role, Role};
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::protocol::events::{CagedEvent, ProtocolEvent, SurplusWithdrawnEvent};
use crate::settlement::Cageable;
use crate::utils::math::{Rad, Wad};

/// Protocol treasury holding surplus and bad debt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDebtEngine {
    address: Address,
    live: bool,
}

impl SystemDebtEngine {
    /// Create an engine acting as `address` (must hold the debt engine role)
    pub fn new(address: Address) -> Self {
        Self { address, live: true }
    }

    /// Engine address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Stablecoin surplus held by the engine
    pub fn surplus(&self, ledger: &Ledger) -> Rad {
        ledger.stablecoin(&self.address)
    }

    /// Bad debt carried by the engine
    pub fn bad_debt(&self, ledger: &Ledger) -> Rad {
        ledger.system_bad_debt(&self.address)
    }

    /// Net `value` of surplus against bad debt
    pub fn settle_system_bad_debt(&self, ledger: &mut Ledger, value: Rad) -> Result<()> {
        ledger.settle_system_bad_debt(&self.address, value)
    }

    /// Net as much surplus against bad debt as possible; returns the value netted
    pub fn settle_max(&self, ledger: &mut Ledger) -> Result<Rad> {
        let value = self.surplus(ledger).min(self.bad_debt(ledger));
        if !value.is_zero() {
            ledger.settle_system_bad_debt(&self.address, value)?;
        }
        Ok(value)
    }

    /// Move collateral fees out of the engine (owner)
    pub fn withdraw_collateral_surplus(
        &self,
        ledger: &mut Ledger,
        caller: &Address,
        pool: &PoolId,
        to: &Address,
        amount: Wad,
    ) -> Result<()> {
        ensure_role(ledger.access(), Role::Owner, caller)?;
        ledger.move_collateral(&self.address, pool, &self.address, to, amount)?;
        ledger.emit(ProtocolEvent::SurplusWithdrawn(SurplusWithdrawnEvent {
            pool: *pool,
            to: *to,
            amount,
        }));
        tracing::info!(pool = %pool, to = %to.short(), %amount, "collateral surplus withdrawn");
        Ok(())
    }

    /// Move stablecoin surplus out of the engine (owner, no bad debt outstanding)
    pub fn withdraw_stablecoin_surplus(&self, ledger: &mut Ledger, caller: &Address, to: &Address, value: Rad) -> Result<()> {
        ensure_role(ledger.access(), Role::Owner, caller)?;
        let bad_debt = self.bad_debt(ledger);
        if !bad_debt.is_zero() {
            return Err(Error::InvalidParameter {
                name: "value".into(),
                reason: format!("bad debt {} outstanding", bad_debt),
            });
        }
        ledger.move_stablecoin(&self.address, &self.address, to, value)?;
        tracing::info!(to = %to.short(), %value, "stablecoin surplus withdrawn");
        Ok(())
    }
}

impl Cageable for SystemDebtEngine {
    fn component(&self) -> &'static str {
        "system_debt_engine"
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn cage(&mut self, ledger: &mut Ledger, caller: &Address) -> Result<()> {
        ensure_any_role(ledger.access(), &[Role::Owner, Role::Settlement], caller)?;
        if !self.live {
            return Err(Error::AlreadyCaged);
        }
        let netted = self.settle_max(ledger)?;
        self.live = false;
        ledger.emit(ProtocolEvent::Caged(CagedEvent {
            component: self.component().into(),
        }));
        tracing::info!(%netted, "system debt engine caged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleRegistry;
    use crate::core::pool::PoolConfig;
    use crate::utils::constants::WAD;
    use std::sync::Arc;

    fn setup() -> (Ledger, SystemDebtEngine, Address) {
        let owner = Address::derive("owner");
        let engine = Address::derive("debt-engine");
        let registry = Arc::new(RoleRegistry::new(owner));
        registry.grant_role(&owner, Role::DebtEngine, engine).unwrap();
        registry.grant_role(&owner, Role::Mintable, owner).unwrap();
        registry.grant_role(&owner, Role::Adapter, owner).unwrap();
        (Ledger::new(registry), SystemDebtEngine::new(engine), owner)
    }

    #[test]
    fn test_cage_nets_surplus_against_bad_debt() {
        let (mut ledger, mut engine, owner) = setup();
        let addr = engine.address();
        // 10 bad debt against the engine, 4 surplus held by it
        ledger.mint_unbacked_stablecoin(&owner, &addr, &owner, Rad::from_units(10)).unwrap();
        ledger.move_stablecoin(&owner, &owner, &addr, Rad::from_units(4)).unwrap();

        engine.cage(&mut ledger, &owner).unwrap();
        assert!(!engine.is_live());
        assert_eq!(engine.surplus(&ledger), Rad::ZERO);
        assert_eq!(engine.bad_debt(&ledger), Rad::from_units(6));
        assert!(matches!(engine.cage(&mut ledger, &owner), Err(Error::AlreadyCaged)));
    }

    #[test]
    fn test_withdraw_collateral_surplus() {
        let (mut ledger, engine, owner) = setup();
        let pool = PoolId::from_label("WXDC").unwrap();
        ledger.initialize_pool(&owner, pool, PoolConfig::default()).unwrap();
        ledger.add_collateral(&owner, &pool, &engine.address(), 3 * WAD as i128).unwrap();

        let treasury = Address::derive("treasury");
        assert!(engine
            .withdraw_collateral_surplus(&mut ledger, &treasury, &pool, &treasury, Wad::ONE)
            .is_err());
        engine
            .withdraw_collateral_surplus(&mut ledger, &owner, &pool, &treasury, Wad::ONE)
            .unwrap();
        assert_eq!(ledger.collateral_token(&pool, &treasury), Wad::ONE);
    }

    #[test]
    fn test_stablecoin_surplus_blocked_by_bad_debt() {
        let (mut ledger, engine, owner) = setup();
        let addr = engine.address();
        ledger.mint_unbacked_stablecoin(&owner, &addr, &addr, Rad::from_units(2)).unwrap();
        assert!(engine
            .withdraw_stablecoin_surplus(&mut ledger, &owner, &owner, Rad::from_units(1))
            .is_err());

        assert_eq!(engine.settle_max(&mut ledger).unwrap(), Rad::from_units(2));
        assert_eq!(engine.bad_debt(&ledger), Rad::ZERO);
    }
}
