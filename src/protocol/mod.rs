//! Protocol orchestration.
//!
//! Events, the operation set, and the single-writer engine that executes
//! operations against the ledger and its components.

pub mod events;
pub mod operations;
#[cfg(feature = "async-service")]
pub mod service;
pub mod state_machine;

pub use events::*;
pub use operations::*;
pub use state_machine::*;
