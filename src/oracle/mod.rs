//! Oracle module.
//!
//! - [`price_feed`]: the per-pool feed interface and a settable feed
//! - [`price_oracle`]: safety-margin price computation written into the ledger

pub mod price_feed;
pub mod price_oracle;

pub use price_feed::*;
pub use price_oracle::*;
