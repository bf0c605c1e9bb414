//! Settlement lifecycle phases.
//!
//! Write-once values live inside the phase that introduces them, so a value
//! can only be read in a phase where it exists and only be set by the
//! transition into that phase.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::math::{Rad, Ray, Wad};

/// Global settlement phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlobalPhase {
    /// Normal operation
    #[default]
    Active,
    /// Shutdown started; debt can be finalized once `deadline` has passed
    Caged {
        /// Cage timestamp
        caged_at: u64,
        /// Earliest finalization timestamp
        deadline: u64,
    },
    /// Total outstanding stablecoin recorded
    DebtFinalized {
        /// Cage timestamp
        caged_at: u64,
        /// Earliest finalization timestamp
        deadline: u64,
        /// Stablecoin outstanding at finalization
        total_debt: Rad,
    },
}

impl GlobalPhase {
    /// Whether shutdown has started
    pub fn is_caged(&self) -> bool {
        !matches!(self, GlobalPhase::Active)
    }

    /// Cooldown deadline, once caged
    pub fn deadline(&self) -> Option<u64> {
        match self {
            GlobalPhase::Active => None,
            GlobalPhase::Caged { deadline, .. } | GlobalPhase::DebtFinalized { deadline, .. } => Some(*deadline),
        }
    }

    /// Finalized total debt
    pub fn total_debt(&self) -> Option<Rad> {
        match self {
            GlobalPhase::DebtFinalized { total_debt, .. } => Some(*total_debt),
            _ => None,
        }
    }

    /// `Active -> Caged`
    pub fn cage(self, caged_at: u64, deadline: u64) -> Result<Self> {
        match self {
            GlobalPhase::Active => Ok(GlobalPhase::Caged { caged_at, deadline }),
            _ => Err(Error::AlreadyCaged),
        }
    }

    /// `Caged -> DebtFinalized` once `now` has reached the deadline
    pub fn finalize_debt(self, now: u64, total_debt: Rad) -> Result<Self> {
        match self {
            GlobalPhase::Active => Err(Error::NotCaged),
            GlobalPhase::DebtFinalized { .. } => Err(Error::DebtAlreadyFinalized),
            GlobalPhase::Caged { caged_at, deadline } => {
                if now < deadline {
                    return Err(Error::CooldownNotElapsed { now, deadline });
                }
                Ok(GlobalPhase::DebtFinalized {
                    caged_at,
                    deadline,
                    total_debt,
                })
            }
        }
    }
}

/// Per-pool settlement phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolPhase {
    /// Cage price snapshotted; positions are being settled
    Caged {
        /// Collateral per stablecoin (Rate)
        cage_price: Ray,
        /// Pool debt value at cage
        debt_at_cage: Rad,
        /// Collateral owed by settled positions but not covered
        gap: Wad,
    },
    /// Cash price fixed; redemption open
    CashPriceFinalized {
        /// Collateral per stablecoin (Rate)
        cage_price: Ray,
        /// Pool debt value at cage
        debt_at_cage: Rad,
        /// Final uncovered collateral
        gap: Wad,
        /// Collateral redeemed per stablecoin (Rate)
        cash_price: Ray,
    },
}

impl PoolPhase {
    /// Freshly caged pool
    pub fn caged(cage_price: Ray, debt_at_cage: Rad) -> Self {
        PoolPhase::Caged {
            cage_price,
            debt_at_cage,
            gap: Wad::ZERO,
        }
    }

    /// Cage price
    pub fn cage_price(&self) -> Ray {
        match self {
            PoolPhase::Caged { cage_price, .. } | PoolPhase::CashPriceFinalized { cage_price, .. } => *cage_price,
        }
    }

    /// Pool debt value at cage
    pub fn debt_at_cage(&self) -> Rad {
        match self {
            PoolPhase::Caged { debt_at_cage, .. } | PoolPhase::CashPriceFinalized { debt_at_cage, .. } => {
                *debt_at_cage
            }
        }
    }

    /// Uncovered collateral
    pub fn gap(&self) -> Wad {
        match self {
            PoolPhase::Caged { gap, .. } | PoolPhase::CashPriceFinalized { gap, .. } => *gap,
        }
    }

    /// Cash price, once finalized
    pub fn cash_price(&self) -> Option<Ray> {
        match self {
            PoolPhase::CashPriceFinalized { cash_price, .. } => Some(*cash_price),
            PoolPhase::Caged { .. } => None,
        }
    }

    /// Add an uncovered shortfall; only before the cash price is fixed
    pub fn add_gap(&mut self, shortfall: Wad, label: &str) -> Result<()> {
        match self {
            PoolPhase::Caged { gap, .. } => {
                *gap = gap.checked_add(shortfall)?;
                Ok(())
            }
            PoolPhase::CashPriceFinalized { .. } => Err(Error::CashPriceAlreadyDefined(label.to_string())),
        }
    }

    /// `Caged -> CashPriceFinalized`
    pub fn finalize(self, cash_price: Ray, label: &str) -> Result<Self> {
        match self {
            PoolPhase::Caged {
                cage_price,
                debt_at_cage,
                gap,
            } => Ok(PoolPhase::CashPriceFinalized {
                cage_price,
                debt_at_cage,
                gap,
                cash_price,
            }),
            PoolPhase::CashPriceFinalized { .. } => Err(Error::CashPriceAlreadyDefined(label.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_transitions() {
        let phase = GlobalPhase::default();
        assert!(!phase.is_caged());
        assert!(matches!(phase.finalize_debt(0, Rad::ZERO), Err(Error::NotCaged)));

        let caged = phase.cage(100, 200).unwrap();
        assert_eq!(caged.deadline(), Some(200));
        assert!(matches!(caged.cage(0, 0), Err(Error::AlreadyCaged)));
        assert!(matches!(
            caged.finalize_debt(150, Rad::ZERO),
            Err(Error::CooldownNotElapsed { now: 150, deadline: 200 })
        ));

        let finalized = caged.finalize_debt(200, Rad::from_units(7)).unwrap();
        assert_eq!(finalized.total_debt(), Some(Rad::from_units(7)));
        assert!(matches!(
            finalized.finalize_debt(300, Rad::ZERO),
            Err(Error::DebtAlreadyFinalized)
        ));
    }

    #[test]
    fn test_pool_gap_frozen_after_finalize() {
        let mut phase = PoolPhase::caged(Ray::ONE, Rad::from_units(10));
        phase.add_gap(Wad::from_units(2), "WXDC").unwrap();
        assert_eq!(phase.gap(), Wad::from_units(2));
        assert_eq!(phase.cash_price(), None);

        let mut finalized = phase.finalize(Ray::from_bps(8_000), "WXDC").unwrap();
        assert_eq!(finalized.cash_price(), Some(Ray::from_bps(8_000)));
        assert!(matches!(
            finalized.add_gap(Wad::ONE, "WXDC"),
            Err(Error::CashPriceAlreadyDefined(_))
        ));
        assert!(finalized.finalize(Ray::ONE, "WXDC").is_err());
    }
}
