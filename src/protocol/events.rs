//! Protocol events for state change notifications.
//!
//! Events are emitted for all significant state changes in the protocol,
//! enabling clients to audit every computed quantity. The ledger owns the
//! [`EventLog`]; a rolled-back transaction truncates it back to the length it
//! had before the transaction started.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::types::{Address, PoolId};
use crate::utils::math::{Rad, Ray, Wad};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    // Pool parameter events
    /// Pool was initialized
    PoolInitialized(PoolInitializedEvent),
    /// Pool parameter was changed
    PoolParameterUpdated(PoolParameterUpdatedEvent),

    // Ledger events
    /// Free collateral credited or debited by an adapter
    CollateralAdded(CollateralAddedEvent),
    /// Free collateral moved between accounts
    CollateralMoved(CollateralMovedEvent),
    /// Stablecoin moved between accounts
    StablecoinMoved(StablecoinMovedEvent),
    /// Position locked/freed collateral or drew/wiped debt
    PositionAdjusted(PositionAdjustedEvent),
    /// Slice of one position moved into another
    PositionMoved(PositionMovedEvent),
    /// Position confiscated (liquidation or settlement)
    PositionConfiscated(PositionConfiscatedEvent),
    /// Unbacked stablecoin minted against bad debt
    UnbackedStablecoinMinted(UnbackedStablecoinMintedEvent),
    /// Bad debt netted against stablecoin
    BadDebtSettled(BadDebtSettledEvent),
    /// Stability fee accrued to a pool
    StabilityFeeAccrued(StabilityFeeAccruedEvent),
    /// Delegate permission granted or revoked
    WhitelistUpdated(WhitelistUpdatedEvent),
    /// Global debt ceiling changed
    TotalDebtCeilingSet(TotalDebtCeilingSetEvent),
    /// Component paused or resumed
    PauseChanged(PauseChangedEvent),
    /// Component caged
    Caged(CagedEvent),

    // Oracle events
    /// Safety-margin price written for a pool
    PriceUpdated(PriceUpdatedEvent),
    /// Stablecoin reference price changed
    ReferencePriceSet(ReferencePriceSetEvent),

    // Liquidation events
    /// Position liquidated
    Liquidation(LiquidationEvent),

    // Treasury events
    /// Collateral surplus withdrawn from the debt engine
    SurplusWithdrawn(SurplusWithdrawnEvent),

    // Settlement events
    /// Global settlement started
    SettlementStarted(SettlementStartedEvent),
    /// Pool caged at a fixed price
    PoolCaged(PoolCagedEvent),
    /// Indebted position cleaned at the cage price
    PositionSettled(PositionSettledEvent),
    /// Total outstanding debt snapshotted
    DebtFinalized(DebtFinalizedEvent),
    /// Pool cash price computed
    CashPriceFinalized(CashPriceFinalizedEvent),
    /// Stablecoin locked into the redemption accumulator
    StablecoinAccumulated(StablecoinAccumulatedEvent),
    /// Accumulated stablecoin redeemed for collateral
    StablecoinRedeemed(StablecoinRedeemedEvent),
    /// Debt-free position collateral released
    LockedCollateralRedeemed(LockedCollateralRedeemedEvent),
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PoolInitialized(_) => "PoolInitialized",
            Self::PoolParameterUpdated(_) => "PoolParameterUpdated",
            Self::CollateralAdded(_) => "CollateralAdded",
            Self::CollateralMoved(_) => "CollateralMoved",
            Self::StablecoinMoved(_) => "StablecoinMoved",
            Self::PositionAdjusted(_) => "PositionAdjusted",
            Self::PositionMoved(_) => "PositionMoved",
            Self::PositionConfiscated(_) => "PositionConfiscated",
            Self::UnbackedStablecoinMinted(_) => "UnbackedStablecoinMinted",
            Self::BadDebtSettled(_) => "BadDebtSettled",
            Self::StabilityFeeAccrued(_) => "StabilityFeeAccrued",
            Self::WhitelistUpdated(_) => "WhitelistUpdated",
            Self::TotalDebtCeilingSet(_) => "TotalDebtCeilingSet",
            Self::PauseChanged(_) => "PauseChanged",
            Self::Caged(_) => "Caged",
            Self::PriceUpdated(_) => "PriceUpdated",
            Self::ReferencePriceSet(_) => "ReferencePriceSet",
            Self::Liquidation(_) => "Liquidation",
            Self::SurplusWithdrawn(_) => "SurplusWithdrawn",
            Self::SettlementStarted(_) => "SettlementStarted",
            Self::PoolCaged(_) => "PoolCaged",
            Self::PositionSettled(_) => "PositionSettled",
            Self::DebtFinalized(_) => "DebtFinalized",
            Self::CashPriceFinalized(_) => "CashPriceFinalized",
            Self::StablecoinAccumulated(_) => "StablecoinAccumulated",
            Self::StablecoinRedeemed(_) => "StablecoinRedeemed",
            Self::LockedCollateralRedeemed(_) => "LockedCollateralRedeemed",
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> [u8; 32] {
        let data = bincode::serialize(self).unwrap_or_default();
        Sha256::digest(&data).into()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOL EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when a pool is initialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInitializedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Pool debt ceiling
    pub debt_ceiling: Rad,
    /// Minimum non-zero position debt
    pub debt_floor: Rad,
    /// Required over-collateralization ratio
    pub liquidation_ratio: Ray,
}

/// Event emitted when a pool parameter changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolParameterUpdatedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Parameter name
    pub parameter: String,
    /// New value (display form)
    pub value: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when an adapter credits or debits free collateral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralAddedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Balance owner
    pub owner: Address,
    /// Signed raw Unit delta
    pub amount: i128,
}

/// Event emitted when free collateral moves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralMovedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Source account
    pub src: Address,
    /// Destination account
    pub dst: Address,
    /// Amount moved
    pub amount: Wad,
}

/// Event emitted when stablecoin moves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablecoinMovedEvent {
    /// Source account
    pub src: Address,
    /// Destination account
    pub dst: Address,
    /// Value moved
    pub value: Rad,
}

/// Event emitted when a position is adjusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionAdjustedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Position owner
    pub position_owner: Address,
    /// Account supplying or receiving free collateral
    pub collateral_owner: Address,
    /// Account receiving or paying stablecoin
    pub stablecoin_owner: Address,
    /// Signed raw collateral delta
    pub collateral_delta: i128,
    /// Signed raw debt share delta
    pub debt_share_delta: i128,
    /// Locked collateral after the adjustment
    pub locked_collateral: Wad,
    /// Debt share after the adjustment
    pub debt_share: Wad,
}

/// Event emitted when part of a position moves to another position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMovedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Source position owner
    pub src: Address,
    /// Destination position owner
    pub dst: Address,
    /// Signed raw collateral delta
    pub collateral_delta: i128,
    /// Signed raw debt share delta
    pub debt_share_delta: i128,
}

/// Event emitted when a position is confiscated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionConfiscatedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Position owner
    pub position_owner: Address,
    /// Account credited with the collateral
    pub collateral_creditor: Address,
    /// Account charged with the bad debt
    pub debt_creditor: Address,
    /// Signed raw collateral delta
    pub collateral_delta: i128,
    /// Signed raw debt share delta
    pub debt_share_delta: i128,
    /// Debt value moved to bad debt
    pub debt_value: Rad,
}

/// Event emitted when unbacked stablecoin is minted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbackedStablecoinMintedEvent {
    /// Account charged with bad debt
    pub from: Address,
    /// Account receiving stablecoin
    pub to: Address,
    /// Value minted
    pub value: Rad,
}

/// Event emitted when bad debt is netted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadDebtSettledEvent {
    /// Account whose bad debt and stablecoin were netted
    pub account: Address,
    /// Value netted
    pub value: Rad,
}

/// Event emitted when a stability fee accrues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityFeeAccruedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Fee recipient
    pub recipient: Address,
    /// Rate increase
    pub rate_delta: Ray,
    /// Stablecoin value credited
    pub value: Rad,
    /// Accumulated rate after accrual
    pub new_rate: Ray,
}

/// Event emitted when a delegate relation changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistUpdatedEvent {
    /// Owner granting the permission
    pub owner: Address,
    /// Delegate
    pub delegate: Address,
    /// Whether the delegate is now allowed
    pub allowed: bool,
}

/// Event emitted when the global debt ceiling changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalDebtCeilingSetEvent {
    /// New ceiling
    pub value: Rad,
}

/// Event emitted when a component is paused or resumed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseChangedEvent {
    /// Component name
    pub component: String,
    /// Whether the component is now paused
    pub paused: bool,
}

/// Event emitted when a component is caged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CagedEvent {
    /// Component name
    pub component: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when the oracle writes a safety-margin price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdatedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Raw feed price
    pub price: Wad,
    /// Feed validity flag
    pub ok: bool,
    /// Resulting safety-margin price
    pub price_with_safety_margin: Ray,
}

/// Event emitted when the stablecoin reference price changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePriceSetEvent {
    /// New reference price
    pub value: Ray,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted for every executed liquidation, carrying all computed quantities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Liquidated position owner
    pub position_owner: Address,
    /// Liquidator paying the debt
    pub liquidator: Address,
    /// Account receiving the seized collateral
    pub collateral_recipient: Address,
    /// Feed price used (Unit)
    pub price: Wad,
    /// Debt share removed from the position
    pub debt_share_liquidated: Wad,
    /// Stablecoin value repaid
    pub debt_value: Rad,
    /// Total collateral seized
    pub collateral_seized: Wad,
    /// Collateral sent to the recipient
    pub collateral_to_liquidator: Wad,
    /// Collateral kept as treasury fee
    pub treasury_fee: Wad,
    /// Debt share left without collateral and booked as bad debt
    pub debt_share_written_off: Wad,
    /// Whether the flash-lending callback was used
    pub flash_lending: bool,
}

/// Event emitted when collateral surplus leaves the debt engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurplusWithdrawnEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Recipient
    pub to: Address,
    /// Amount withdrawn
    pub amount: Wad,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTLEMENT EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when global settlement starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementStartedEvent {
    /// Cage timestamp
    pub caged_at: u64,
    /// Earliest timestamp for debt finalization
    pub deadline: u64,
}

/// Event emitted when a pool is caged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolCagedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Collateral per stablecoin at cage (Rate)
    pub cage_price: Ray,
    /// Pool stablecoin issued at cage
    pub debt_at_cage: Rad,
}

/// Event emitted when an indebted position is cleaned at the cage price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSettledEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Position owner
    pub position_owner: Address,
    /// Debt share removed
    pub debt_share: Wad,
    /// Collateral taken
    pub collateral_taken: Wad,
    /// Collateral shortfall added to the pool gap
    pub shortfall: Wad,
}

/// Event emitted when total debt is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtFinalizedEvent {
    /// Total stablecoin issued at finalization
    pub total_debt: Rad,
}

/// Event emitted when a pool cash price is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashPriceFinalizedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Collateral per stablecoin unit (Rate)
    pub cash_price: Ray,
}

/// Event emitted when stablecoin enters the redemption accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablecoinAccumulatedEvent {
    /// Holder
    pub owner: Address,
    /// Amount accumulated (Unit)
    pub amount: Wad,
    /// Accumulator balance after the call
    pub total: Wad,
}

/// Event emitted when accumulated stablecoin is redeemed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StablecoinRedeemedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Holder
    pub owner: Address,
    /// Stablecoin amount redeemed (Unit)
    pub amount: Wad,
    /// Collateral received
    pub collateral: Wad,
}

/// Event emitted when a debt-free position's collateral is released
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedCollateralRedeemedEvent {
    /// Pool identifier
    pub pool: PoolId,
    /// Position owner
    pub position_owner: Address,
    /// Recipient of the collateral
    pub recipient: Address,
    /// Collateral released
    pub amount: Wad,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// An event stamped with the block context it was emitted in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log
    pub sequence: u64,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
    /// The event
    pub event: ProtocolEvent,
}

/// Ordered log of emitted events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
    block_height: u64,
    timestamp: u64,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the block context used to stamp subsequent events
    pub fn set_block(&mut self, block_height: u64, timestamp: u64) {
        self.block_height = block_height;
        self.timestamp = timestamp;
    }

    /// Add an event to the log
    pub fn push(&mut self, event: ProtocolEvent) {
        let sequence = self.records.len() as u64;
        self.records.push(EventRecord {
            sequence,
            block_height: self.block_height,
            timestamp: self.timestamp,
            event,
        });
    }

    /// Get all records
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records emitted after the first `from` records
    pub fn since(&self, from: usize) -> &[EventRecord] {
        self.records.get(from..).unwrap_or(&[])
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.records
            .iter()
            .map(|r| &r.event)
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record after the first `len`
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Running SHA-256 over every event hash, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update(record.event.hash());
        }
        hex::encode(hasher.finalize())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
