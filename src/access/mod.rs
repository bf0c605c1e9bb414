//! Role-based access control.
//!
//! Privileged entry points never look up roles themselves: each component is
//! handed an [`AccessControl`] implementation and calls [`ensure_role`] or
//! [`ensure_any_role`] before touching state.
//!
//! Role hierarchy:
//! - `Owner` grants and revokes every role
//! - `Governance` can pause and reconfigure pools
//! - component roles (`Adapter`, `PriceOracle`, `LiquidationEngine`, ...) gate
//!   the ledger primitives each collaborator needs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::RwLock;

use crate::core::types::Address;
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// ROLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Privileged roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Protocol owner
    Owner,
    /// Governance (parameter changes, pause)
    Governance,
    /// Price oracle writing safety-margin prices
    PriceOracle,
    /// Collateral adapter crediting free collateral
    Adapter,
    /// Liquidation engine and strategies (confiscation)
    LiquidationEngine,
    /// Stability fee collector (rate accrual)
    StabilityFeeCollector,
    /// Settlement engine (cage, confiscation during shutdown)
    Settlement,
    /// Minting of unbacked stablecoin
    Mintable,
    /// System debt engine (bad-debt netting)
    DebtEngine,
}

impl Role {
    /// All roles
    pub const ALL: [Role; 9] = [
        Role::Owner,
        Role::Governance,
        Role::PriceOracle,
        Role::Adapter,
        Role::LiquidationEngine,
        Role::StabilityFeeCollector,
        Role::Settlement,
        Role::Mintable,
        Role::DebtEngine,
    ];
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCESS CONTROL
// ═══════════════════════════════════════════════════════════════════════════════

/// Role lookup consumed by every privileged entry point
pub trait AccessControl: Send + Sync {
    /// Check if `account` holds `role`
    fn has_role(&self, role: Role, account: &Address) -> bool;
}

/// Fail with [`Error::MissingRole`] unless `caller` holds `role`
pub fn ensure_role(access: &dyn AccessControl, role: Role, caller: &Address) -> Result<()> {
    if access.has_role(role, caller) {
        Ok(())
    } else {
        Err(Error::MissingRole {
            role,
            caller: caller.to_hex(),
        })
    }
}

/// Fail with [`Error::MissingAnyRole`] unless `caller` holds one of `roles`
pub fn ensure_any_role(access: &dyn AccessControl, roles: &[Role], caller: &Address) -> Result<()> {
    if roles.iter().any(|role| access.has_role(*role, caller)) {
        Ok(())
    } else {
        Err(Error::MissingAnyRole {
            roles: roles.to_vec(),
            caller: caller.to_hex(),
        })
    }
}

/// In-memory role assignments
#[derive(Debug)]
pub struct RoleRegistry {
    roles: RwLock<HashSet<(Role, Address)>>,
}

impl RoleRegistry {
    /// Create a registry with `owner` holding [`Role::Owner`]
    pub fn new(owner: Address) -> Self {
        let mut roles = HashSet::new();
        roles.insert((Role::Owner, owner));
        Self {
            roles: RwLock::new(roles),
        }
    }

    /// Grant a role (owner only)
    pub fn grant_role(&self, caller: &Address, role: Role, account: Address) -> Result<()> {
        ensure_role(self, Role::Owner, caller)?;
        let mut roles = self.roles.write().map_err(|_| Error::Lock)?;
        if roles.insert((role, account)) {
            tracing::info!(?role, account = %account.short(), "role granted");
        }
        Ok(())
    }

    /// Revoke a role (owner only); the last owner cannot be revoked
    pub fn revoke_role(&self, caller: &Address, role: Role, account: &Address) -> Result<()> {
        ensure_role(self, Role::Owner, caller)?;
        let mut roles = self.roles.write().map_err(|_| Error::Lock)?;
        if role == Role::Owner {
            let owners = roles.iter().filter(|(r, _)| *r == Role::Owner).count();
            if owners <= 1 && roles.contains(&(Role::Owner, *account)) {
                return Err(Error::InvalidParameter {
                    name: "role".into(),
                    reason: "cannot revoke the last owner".into(),
                });
            }
        }
        if roles.remove(&(role, *account)) {
            tracing::info!(?role, account = %account.short(), "role revoked");
        }
        Ok(())
    }

    /// Number of accounts holding a role
    pub fn member_count(&self, role: Role) -> usize {
        self.roles
            .read()
            .map(|roles| roles.iter().filter(|(r, _)| *r == role).count())
            .unwrap_or(0)
    }
}

impl AccessControl for RoleRegistry {
    fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles
            .read()
            .map(|roles| roles.contains(&(role, *account)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_grants_roles() {
        let owner = Address::derive("owner");
        let oracle = Address::derive("oracle");
        let registry = RoleRegistry::new(owner);

        assert!(ensure_role(&registry, Role::PriceOracle, &oracle).is_err());
        registry.grant_role(&owner, Role::PriceOracle, oracle).unwrap();
        assert!(ensure_role(&registry, Role::PriceOracle, &oracle).is_ok());

        registry.revoke_role(&owner, Role::PriceOracle, &oracle).unwrap();
        assert!(!registry.has_role(Role::PriceOracle, &oracle));
    }

    #[test]
    fn test_non_owner_cannot_grant() {
        let owner = Address::derive("owner");
        let mallory = Address::derive("mallory");
        let registry = RoleRegistry::new(owner);

        let err = registry.grant_role(&mallory, Role::Mintable, mallory).unwrap_err();
        assert!(matches!(err, Error::MissingRole { role: Role::Owner, .. }));
        assert!(!registry.has_role(Role::Mintable, &mallory));
    }

    #[test]
    fn test_last_owner_protected() {
        let owner = Address::derive("owner");
        let registry = RoleRegistry::new(owner);
        assert!(registry.revoke_role(&owner, Role::Owner, &owner).is_err());

        let second = Address::derive("second");
        registry.grant_role(&owner, Role::Owner, second).unwrap();
        registry.revoke_role(&owner, Role::Owner, &owner).unwrap();
        assert_eq!(registry.member_count(Role::Owner), 1);
    }

    #[test]
    fn test_ensure_any_role() {
        let owner = Address::derive("owner");
        let gov = Address::derive("gov");
        let registry = RoleRegistry::new(owner);
        registry.grant_role(&owner, Role::Governance, gov).unwrap();

        let accepted = [Role::Owner, Role::Governance];
        assert!(ensure_any_role(&registry, &accepted, &owner).is_ok());
        assert!(ensure_any_role(&registry, &accepted, &gov).is_ok());
        assert!(matches!(
            ensure_any_role(&registry, &accepted, &Address::derive("x")),
            Err(Error::MissingAnyRole { .. })
        ));
    }
}
