//! Ledger state snapshot.
//!
//! Everything the ledger owns lives in one cloneable [`LedgerState`]; composite
//! transactions restore a clone of it on failure. Pool collaborators (feeds and
//! adapters) are shared handles and are not part of the serialized form.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::core::pool::Pool;
use crate::core::position::Position;
use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::utils::math::{Rad, Wad};

/// All balances, positions and pools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    pub(crate) pools: HashMap<PoolId, Pool>,
    pub(crate) positions: HashMap<(PoolId, Address), Position>,
    pub(crate) collateral_token: HashMap<(PoolId, Address), Wad>,
    pub(crate) stablecoin: HashMap<Address, Rad>,
    pub(crate) system_bad_debt: HashMap<Address, Rad>,
    pub(crate) whitelist: HashSet<(Address, Address)>,
    pub(crate) pool_stablecoin_issued: HashMap<PoolId, Rad>,
    pub(crate) total_stablecoin_issued: Rad,
    pub(crate) total_unbacked_stablecoin: Rad,
    pub(crate) total_debt_ceiling: Rad,
    pub(crate) live: bool,
    pub(crate) paused: bool,
}

impl LedgerState {
    /// Empty live state
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
            positions: HashMap::new(),
            collateral_token: HashMap::new(),
            stablecoin: HashMap::new(),
            system_bad_debt: HashMap::new(),
            whitelist: HashSet::new(),
            pool_stablecoin_issued: HashMap::new(),
            total_stablecoin_issued: Rad::ZERO,
            total_unbacked_stablecoin: Rad::ZERO,
            total_debt_ceiling: Rad::ZERO,
            live: true,
            paused: false,
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes; pool collaborators are not restored
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }

    // Zero balances are removed so that equal states compare equal.

    pub(crate) fn set_collateral(&mut self, pool: PoolId, owner: Address, amount: Wad) {
        if amount.is_zero() {
            self.collateral_token.remove(&(pool, owner));
        } else {
            self.collateral_token.insert((pool, owner), amount);
        }
    }

    pub(crate) fn set_stablecoin(&mut self, owner: Address, value: Rad) {
        if value.is_zero() {
            self.stablecoin.remove(&owner);
        } else {
            self.stablecoin.insert(owner, value);
        }
    }

    pub(crate) fn set_bad_debt(&mut self, owner: Address, value: Rad) {
        if value.is_zero() {
            self.system_bad_debt.remove(&owner);
        } else {
            self.system_bad_debt.insert(owner, value);
        }
    }

    pub(crate) fn set_position(&mut self, pool: PoolId, owner: Address, position: Position) {
        if position.is_empty() {
            self.positions.remove(&(pool, owner));
        } else {
            self.positions.insert((pool, owner), position);
        }
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}
