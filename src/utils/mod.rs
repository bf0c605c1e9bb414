//! Utility modules for the stablecoin core.
//!
//! This module contains shared utilities used across the protocol:
//! - Fixed-point arithmetic
//! - Validation helpers
//! - Constants

pub mod constants;
pub mod math;
pub mod validation;

pub use constants::*;
pub use math::*;
pub use validation::*;
