//! Protocol operations.
//!
//! Every state change a caller can request, as data. Operations are executed
//! one at a time by [`crate::protocol::ProtocolEngine`]; each either commits
//! completely or fails with a named error and leaves state unchanged.

use serde::{Deserialize, Serialize};

use crate::core::types::{Address, PoolId};
use crate::liquidation::strategy::{LiquidationInfo, LiquidationRequest};
use crate::protocol::events::PositionSettledEvent;
use crate::utils::math::{Rad, Ray, Wad};

/// Component targeted by pause/unpause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// Ledger
    Ledger,
    /// Price safety oracle
    PriceOracle,
    /// Liquidation engine
    LiquidationEngine,
}

/// All protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    // ── ledger ──────────────────────────────────────────────────────────────
    /// Credit or debit free collateral (adapter role)
    AddCollateral {
        /// Pool identifier
        pool: PoolId,
        /// Account credited
        owner: Address,
        /// Signed raw amount (Unit)
        amount: i128,
    },
    /// Move free collateral
    MoveCollateral {
        /// Pool identifier
        pool: PoolId,
        /// Source
        src: Address,
        /// Destination
        dst: Address,
        /// Amount
        amount: Wad,
    },
    /// Move stablecoin
    MoveStablecoin {
        /// Source
        src: Address,
        /// Destination
        dst: Address,
        /// Value
        value: Rad,
    },
    /// Lock/free collateral and draw/wipe debt
    AdjustPosition {
        /// Pool identifier
        pool: PoolId,
        /// Position owner
        position_owner: Address,
        /// Free-collateral account
        collateral_owner: Address,
        /// Stablecoin account
        stablecoin_owner: Address,
        /// Signed raw collateral delta
        collateral_delta: i128,
        /// Signed raw debt share delta
        debt_share_delta: i128,
    },
    /// Move part of one position into another
    MovePosition {
        /// Pool identifier
        pool: PoolId,
        /// Source position owner
        src: Address,
        /// Destination position owner
        dst: Address,
        /// Signed raw collateral delta
        collateral_delta: i128,
        /// Signed raw debt share delta
        debt_share_delta: i128,
    },
    /// Allow `delegate` to act for the caller
    Whitelist {
        /// Delegate
        delegate: Address,
    },
    /// Revoke `delegate`
    Blacklist {
        /// Delegate
        delegate: Address,
    },
    /// Raise the pool rate and credit the fee to the debt engine
    AccrueStabilityFee {
        /// Pool identifier
        pool: PoolId,
        /// Rate increase
        rate_delta: Ray,
    },
    /// Set the global debt ceiling (owner)
    SetTotalDebtCeiling {
        /// New ceiling
        value: Rad,
    },

    // ── oracle ──────────────────────────────────────────────────────────────
    /// Recompute safety-margin prices, all or nothing
    UpdatePrices {
        /// Pools to update
        pools: Vec<PoolId>,
    },
    /// Set the stablecoin reference price (owner)
    SetReferencePrice {
        /// New reference price
        value: Ray,
    },

    // ── liquidation ─────────────────────────────────────────────────────────
    /// Liquidate an unsafe position
    Liquidate(LiquidationRequest),
    /// Net debt engine surplus against bad debt
    SettleBadDebt,

    // ── administration ──────────────────────────────────────────────────────
    /// Pause a component (owner or governance)
    Pause(Component),
    /// Resume a component (owner or governance)
    Unpause(Component),

    // ── settlement ──────────────────────────────────────────────────────────
    /// Start global settlement (owner)
    Cage {
        /// Cooldown before debt finalization
        cooldown_secs: u64,
    },
    /// Snapshot a pool's cage price
    CagePool {
        /// Pool identifier
        pool: PoolId,
    },
    /// Clear one indebted position at the cage price
    SettlePosition {
        /// Pool identifier
        pool: PoolId,
        /// Position owner
        owner: Address,
    },
    /// Release the collateral of a debt-free position
    RedeemLockedCollateral {
        /// Pool identifier
        pool: PoolId,
        /// Position owner
        position_owner: Address,
        /// Recipient
        recipient: Address,
        /// Adapter data
        data: Vec<u8>,
    },
    /// Record total outstanding stablecoin
    FinalizeDebt,
    /// Fix a pool's cash price
    FinalizeCashPrice {
        /// Pool identifier
        pool: PoolId,
    },
    /// Lock stablecoin for redemption
    AccumulateStablecoin {
        /// Amount (Unit)
        amount: Wad,
    },
    /// Redeem accumulated stablecoin for collateral
    RedeemStablecoin {
        /// Pool identifier
        pool: PoolId,
        /// Amount (Unit)
        amount: Wad,
    },
}

impl Operation {
    /// Operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::AddCollateral { .. } => "AddCollateral",
            Self::MoveCollateral { .. } => "MoveCollateral",
            Self::MoveStablecoin { .. } => "MoveStablecoin",
            Self::AdjustPosition { .. } => "AdjustPosition",
            Self::MovePosition { .. } => "MovePosition",
            Self::Whitelist { .. } => "Whitelist",
            Self::Blacklist { .. } => "Blacklist",
            Self::AccrueStabilityFee { .. } => "AccrueStabilityFee",
            Self::SetTotalDebtCeiling { .. } => "SetTotalDebtCeiling",
            Self::UpdatePrices { .. } => "UpdatePrices",
            Self::SetReferencePrice { .. } => "SetReferencePrice",
            Self::Liquidate(_) => "Liquidate",
            Self::SettleBadDebt => "SettleBadDebt",
            Self::Pause(_) => "Pause",
            Self::Unpause(_) => "Unpause",
            Self::Cage { .. } => "Cage",
            Self::CagePool { .. } => "CagePool",
            Self::SettlePosition { .. } => "SettlePosition",
            Self::RedeemLockedCollateral { .. } => "RedeemLockedCollateral",
            Self::FinalizeDebt => "FinalizeDebt",
            Self::FinalizeCashPrice { .. } => "FinalizeCashPrice",
            Self::AccumulateStablecoin { .. } => "AccumulateStablecoin",
            Self::RedeemStablecoin { .. } => "RedeemStablecoin",
        }
    }

    /// Whether the operation belongs to the shutdown path
    pub fn is_settlement(&self) -> bool {
        matches!(
            self,
            Self::Cage { .. }
                | Self::CagePool { .. }
                | Self::SettlePosition { .. }
                | Self::RedeemLockedCollateral { .. }
                | Self::FinalizeDebt
                | Self::FinalizeCashPrice { .. }
                | Self::AccumulateStablecoin { .. }
                | Self::RedeemStablecoin { .. }
        )
    }
}

/// Result of an executed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationResult {
    /// No value returned
    Done,
    /// Safety-margin prices written
    Prices(Vec<Ray>),
    /// Liquidation quantities
    Liquidation(LiquidationInfo),
    /// Value netted against bad debt
    Netted(Rad),
    /// Cage price of a pool
    CagePrice(Ray),
    /// Settled position
    PositionSettled(PositionSettledEvent),
    /// Cash price of a pool
    CashPrice(Ray),
    /// Collateral released or redeemed
    Collateral(Wad),
    /// Accumulator balance after the call
    Accumulated(Wad),
}
