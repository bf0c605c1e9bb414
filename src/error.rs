//! Error types for the stablecoin core.
//!
//! Every violated precondition surfaces as its own variant so callers can
//! discriminate the cause without inspecting state. [`Error::kind`] groups
//! the variants into the protocol's error taxonomy.

use thiserror::Error;

use crate::access::Role;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the required role or owner/delegate relation
    Authorization,
    /// A solvency or transfer invariant would be violated
    Invariant,
    /// Price feed not fresh or non-positive
    Staleness,
    /// Settlement operation attempted in the wrong phase
    Phase,
    /// Operation attempted while caged or paused
    Lifecycle,
    /// Arithmetic or internal failure
    Internal,
}

/// Main error type for the stablecoin core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller does not hold the required role
    #[error("Caller {caller} is missing role {role:?}")]
    MissingRole {
        /// Required role
        role: Role,
        /// Caller address (hex)
        caller: String,
    },

    /// Caller holds none of the accepted roles
    #[error("Caller {caller} holds none of the roles {roles:?}")]
    MissingAnyRole {
        /// Accepted roles
        roles: Vec<Role>,
        /// Caller address (hex)
        caller: String,
    },

    /// Caller is neither the owner nor a whitelisted delegate
    #[error("Caller {caller} is not allowed to act for {owner}")]
    NotAllowed {
        /// Owner of the balance or position
        owner: String,
        /// Caller address (hex)
        caller: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Invariant Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Address is the zero address
    #[error("Address cannot be zero: {0}")]
    ZeroAddress(String),

    /// Transfer source equals destination
    #[error("Source and destination are the same address")]
    SameAddress,

    /// Free collateral balance too small
    #[error("Insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        /// Required amount
        required: String,
        /// Available amount
        available: String,
    },

    /// Stablecoin balance too small
    #[error("Insufficient stablecoin: required {required}, available {available}")]
    InsufficientStablecoin {
        /// Required value
        required: String,
        /// Available value
        available: String,
    },

    /// Bad debt balance too small to settle
    #[error("Insufficient bad debt: required {required}, available {available}")]
    InsufficientBadDebt {
        /// Required value
        required: String,
        /// Available value
        available: String,
    },

    /// Resulting position debt is dust
    #[error("Position debt below debt floor")]
    DebtFloor,

    /// Source position debt is dust after move
    #[error("Source position debt below debt floor")]
    DebtFloorSrc,

    /// Destination position debt is dust after move
    #[error("Destination position debt below debt floor")]
    DebtFloorDst,

    /// Position would be under-collateralized
    #[error("Position is not safe")]
    NotSafe,

    /// Source position would be under-collateralized after move
    #[error("Source position is not safe")]
    NotSafeSrc,

    /// Destination position would be under-collateralized after move
    #[error("Destination position is not safe")]
    NotSafeDst,

    /// Pool debt ceiling exceeded
    #[error("Pool debt ceiling exceeded")]
    PoolDebtCeilingExceeded,

    /// Global debt ceiling exceeded
    #[error("Total debt ceiling exceeded")]
    TotalDebtCeilingExceeded,

    /// Position debt ceiling exceeded
    #[error("Position debt ceiling exceeded")]
    PositionDebtCeilingExceeded,

    /// Destination position debt ceiling exceeded after move
    #[error("Destination position debt ceiling exceeded")]
    PositionDebtCeilingExceededDst,

    /// Collateral amount does not fit a signed delta
    #[error("Collateral amount {0} exceeds the signed bound")]
    CollateralAmountOverflow(String),

    /// Liquidation requested against a safe position
    #[error("Position is safe and cannot be liquidated")]
    PositionIsSafe,

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Flash-lending callee did not complete
    #[error("Flash lending callback failed: {0}")]
    FlashLendingFailed(String),

    // ═══════════════════════════════════════════════════════════════════
    // Staleness Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Price feed reported a stale or invalid price
    #[error("Invalid price from feed")]
    InvalidPrice,

    /// Price feed reported a zero collateral price
    #[error("Collateral price is zero")]
    ZeroCollateralPrice,

    /// Pool has no price feed configured
    #[error("No price feed configured for pool {0}")]
    MissingPriceFeed(String),

    // ═══════════════════════════════════════════════════════════════════
    // Phase Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Settlement already caged
    #[error("System already caged")]
    AlreadyCaged,

    /// Settlement not caged yet
    #[error("System not caged")]
    NotCaged,

    /// Pool already caged
    #[error("Pool {0} already caged")]
    PoolAlreadyCaged(String),

    /// Pool not caged yet
    #[error("Pool {0} not caged")]
    PoolNotCaged(String),

    /// Cage cooldown outside allowed bounds
    #[error("Cooldown {got}s outside [{min}s, {max}s]")]
    InvalidCooldown {
        /// Requested cooldown
        got: u64,
        /// Minimum cooldown
        min: u64,
        /// Maximum cooldown
        max: u64,
    },

    /// Cooldown deadline not reached
    #[error("Cooldown not elapsed: now {now}, deadline {deadline}")]
    CooldownNotElapsed {
        /// Current timestamp
        now: u64,
        /// Deadline timestamp
        deadline: u64,
    },

    /// Total debt already finalized
    #[error("Debt already finalized")]
    DebtAlreadyFinalized,

    /// Total debt not finalized yet
    #[error("Debt not finalized")]
    DebtNotFinalized,

    /// System debt engine still holds surplus stablecoin
    #[error("Surplus not zero: {0}")]
    SurplusNotZero(String),

    /// No outstanding stablecoin to finalize
    #[error("Total stablecoin issued is zero")]
    ZeroTotalDebt,

    /// Cash price already defined for pool
    #[error("Cash price already defined for pool {0}")]
    CashPriceAlreadyDefined(String),

    /// Cash price not defined for pool
    #[error("Cash price not defined for pool {0}")]
    CashPriceNotDefined(String),

    /// Redemption exceeds accumulated stablecoin
    #[error("Insufficient accumulator: requested {requested}, available {available}")]
    InsufficientAccumulator {
        /// Requested amount
        requested: String,
        /// Remaining accumulated amount
        available: String,
    },

    /// Position still carries debt
    #[error("Position still has debt")]
    PositionHasDebt,

    /// Pool still has indebted positions at the time of finalization
    #[error("Pool {0} has unsettled positions")]
    PoolNotSettled(String),

    // ═══════════════════════════════════════════════════════════════════
    // Lifecycle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Component is caged
    #[error("Not live")]
    NotLive,

    /// Component is paused
    #[error("Paused")]
    Paused,

    /// Pool not initialized
    #[error("Pool {0} not initialized")]
    PoolNotInitialized(String),

    /// Pool already initialized
    #[error("Pool {0} already initialized")]
    PoolAlreadyInitialized(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared state lock poisoned or service unavailable
    #[error("Failed to acquire lock")]
    Lock,
}

impl Error {
    /// Taxonomy of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingRole { .. } | Error::MissingAnyRole { .. } | Error::NotAllowed { .. } => {
                ErrorKind::Authorization
            }

            Error::ZeroAmount
            | Error::ZeroAddress(_)
            | Error::SameAddress
            | Error::InsufficientCollateral { .. }
            | Error::InsufficientStablecoin { .. }
            | Error::InsufficientBadDebt { .. }
            | Error::DebtFloor
            | Error::DebtFloorSrc
            | Error::DebtFloorDst
            | Error::NotSafe
            | Error::NotSafeSrc
            | Error::NotSafeDst
            | Error::PoolDebtCeilingExceeded
            | Error::TotalDebtCeilingExceeded
            | Error::PositionDebtCeilingExceeded
            | Error::PositionDebtCeilingExceededDst
            | Error::CollateralAmountOverflow(_)
            | Error::PositionIsSafe
            | Error::InvalidParameter { .. }
            | Error::FlashLendingFailed(_) => ErrorKind::Invariant,

            Error::InvalidPrice | Error::ZeroCollateralPrice | Error::MissingPriceFeed(_) => {
                ErrorKind::Staleness
            }

            Error::AlreadyCaged
            | Error::NotCaged
            | Error::PoolAlreadyCaged(_)
            | Error::PoolNotCaged(_)
            | Error::InvalidCooldown { .. }
            | Error::CooldownNotElapsed { .. }
            | Error::DebtAlreadyFinalized
            | Error::DebtNotFinalized
            | Error::SurplusNotZero(_)
            | Error::ZeroTotalDebt
            | Error::CashPriceAlreadyDefined(_)
            | Error::CashPriceNotDefined(_)
            | Error::InsufficientAccumulator { .. }
            | Error::PositionHasDebt
            | Error::PoolNotSettled(_) => ErrorKind::Phase,

            Error::NotLive
            | Error::Paused
            | Error::PoolNotInitialized(_)
            | Error::PoolAlreadyInitialized(_) => ErrorKind::Lifecycle,

            Error::Overflow { .. }
            | Error::Underflow { .. }
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Lock => ErrorKind::Internal,
        }
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::Overflow { .. } | Error::Underflow { .. } | Error::Lock
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Authorization errors: 1xxx
            Error::MissingRole { .. } => 1001,
            Error::MissingAnyRole { .. } => 1002,
            Error::NotAllowed { .. } => 1003,

            // Invariant errors: 2xxx
            Error::ZeroAmount => 2001,
            Error::ZeroAddress(_) => 2002,
            Error::SameAddress => 2003,
            Error::InsufficientCollateral { .. } => 2004,
            Error::InsufficientStablecoin { .. } => 2005,
            Error::InsufficientBadDebt { .. } => 2006,
            Error::DebtFloor => 2007,
            Error::DebtFloorSrc => 2008,
            Error::DebtFloorDst => 2009,
            Error::NotSafe => 2010,
            Error::NotSafeSrc => 2011,
            Error::NotSafeDst => 2012,
            Error::PoolDebtCeilingExceeded => 2013,
            Error::TotalDebtCeilingExceeded => 2014,
            Error::PositionDebtCeilingExceeded => 2015,
            Error::PositionDebtCeilingExceededDst => 2016,
            Error::CollateralAmountOverflow(_) => 2017,
            Error::PositionIsSafe => 2018,
            Error::InvalidParameter { .. } => 2019,
            Error::FlashLendingFailed(_) => 2020,

            // Staleness errors: 3xxx
            Error::InvalidPrice => 3001,
            Error::ZeroCollateralPrice => 3002,
            Error::MissingPriceFeed(_) => 3003,

            // Phase errors: 4xxx
            Error::AlreadyCaged => 4001,
            Error::NotCaged => 4002,
            Error::PoolAlreadyCaged(_) => 4003,
            Error::PoolNotCaged(_) => 4004,
            Error::InvalidCooldown { .. } => 4005,
            Error::CooldownNotElapsed { .. } => 4006,
            Error::DebtAlreadyFinalized => 4007,
            Error::DebtNotFinalized => 4008,
            Error::SurplusNotZero(_) => 4009,
            Error::ZeroTotalDebt => 4010,
            Error::CashPriceAlreadyDefined(_) => 4011,
            Error::CashPriceNotDefined(_) => 4012,
            Error::InsufficientAccumulator { .. } => 4013,
            Error::PositionHasDebt => 4014,
            Error::PoolNotSettled(_) => 4015,

            // Lifecycle errors: 5xxx
            Error::NotLive => 5001,
            Error::Paused => 5002,
            Error::PoolNotInitialized(_) => 5003,
            Error::PoolAlreadyInitialized(_) => 5004,

            // Internal errors: 9xxx
            Error::Overflow { .. } => 9001,
            Error::Underflow { .. } => 9002,
            Error::Serialization(_) => 9003,
            Error::Config(_) => 9004,
            Error::Lock => 9005,
        }
    }
}
