//! Price feed interface and a settable in-memory feed.
//!
//! Feeds are external collaborators: the core only ever asks for the latest
//! `(price, ok)` pair. [`SimplePriceFeed`] is the reference implementation used
//! by tests and the simulator; freshness follows a max-age rule against the
//! timestamp the feed was last set at.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::math::Wad;

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-pool collateral price source
pub trait PriceFeed: Send + Sync + fmt::Debug {
    /// Latest price and whether it is fresh and valid
    fn peek_price(&self) -> (Wad, bool);

    /// Latest price regardless of freshness
    fn read_price(&self) -> Wad;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// A single price observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceData {
    /// Collateral price in stablecoin units (Unit scale)
    pub price: Wad,
    /// Unix timestamp when the price was recorded
    pub timestamp: u64,
}

impl PriceData {
    /// Create a new observation
    pub fn new(price: Wad, timestamp: u64) -> Self {
        Self { price, timestamp }
    }

    /// Check if the observation is fresh at `now`
    pub fn is_fresh(&self, now: u64, max_age: u64) -> bool {
        now.saturating_sub(self.timestamp) <= max_age
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMPLE PRICE FEED
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct FeedState {
    current: PriceData,
    now: u64,
    max_age: u64,
    halted: bool,
}

/// Settable price feed with staleness tracking
#[derive(Debug)]
pub struct SimplePriceFeed {
    state: RwLock<FeedState>,
}

impl SimplePriceFeed {
    /// Create a feed with an initial price and a maximum age in seconds
    pub fn new(price: Wad, max_age: u64) -> Self {
        Self {
            state: RwLock::new(FeedState {
                current: PriceData::new(price, 0),
                now: 0,
                max_age,
                halted: false,
            }),
        }
    }

    /// Record a new price observed at the feed's current time
    pub fn set_price(&self, price: Wad) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        state.current = PriceData::new(price, state.now);
        Ok(())
    }

    /// Advance the feed clock; the price ages without being replaced
    pub fn advance_to(&self, now: u64) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        state.now = state.now.max(now);
        Ok(())
    }

    /// Mark the feed invalid (`ok == false`) until resumed
    pub fn set_halted(&self, halted: bool) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        state.halted = halted;
        Ok(())
    }

    /// Latest observation
    pub fn current(&self) -> PriceData {
        self.state
            .read()
            .map(|state| state.current)
            .unwrap_or_default()
    }
}

impl PriceFeed for SimplePriceFeed {
    fn peek_price(&self) -> (Wad, bool) {
        match self.state.read() {
            Ok(state) => {
                let ok = !state.halted && state.current.is_fresh(state.now, state.max_age);
                (state.current.price, ok)
            }
            Err(_) => (Wad::ZERO, false),
        }
    }

    fn read_price(&self) -> Wad {
        self.current().price
    }
}
