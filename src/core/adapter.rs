//! Collateral custody adapters.
//!
//! The ledger only books collateral. Whenever liquidation or settlement moves
//! collateral out of a position, the pool's adapter is told so that custody
//! kept outside the core can follow. Notifications are sent with
//! [`notify_committed`] after the ledger transaction has committed, so an
//! adapter never sees a move that was rolled back.

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::core::types::{Address, PoolId};
use crate::error::{Error, Result};
use crate::utils::math::Wad;

/// Custody hook for a pool's collateral
pub trait CollateralAdapter: Send + Sync + fmt::Debug {
    /// Collateral moved from `src` to `dst` inside the ledger
    fn on_move_collateral(
        &self,
        pool: &PoolId,
        src: &Address,
        dst: &Address,
        amount: Wad,
        data: &[u8],
    ) -> Result<()>;
}

/// A custody movement seen by [`RecordingAdapter`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterMove {
    /// Pool identifier
    pub pool: PoolId,
    /// Source account
    pub src: Address,
    /// Destination account
    pub dst: Address,
    /// Amount moved
    pub amount: Wad,
}

/// In-memory adapter that records every notification
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    moves: RwLock<Vec<AdapterMove>>,
}

impl RecordingAdapter {
    /// Create an empty adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded moves
    pub fn moves(&self) -> Vec<AdapterMove> {
        self.moves.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// Total amount received by `account`
    pub fn received_by(&self, account: &Address) -> Wad {
        self.moves()
            .iter()
            .filter(|m| m.dst == *account)
            .fold(Wad::ZERO, |acc, m| Wad::from_raw(acc.raw().saturating_add(m.amount.raw())))
    }
}

impl CollateralAdapter for RecordingAdapter {
    fn on_move_collateral(
        &self,
        pool: &PoolId,
        src: &Address,
        dst: &Address,
        amount: Wad,
        _data: &[u8],
    ) -> Result<()> {
        let mut moves = self.moves.write().map_err(|_| Error::Lock)?;
        moves.push(AdapterMove {
            pool: *pool,
            src: *src,
            dst: *dst,
            amount,
        });
        Ok(())
    }
}

/// Report committed collateral moves to `adapter`, in order.
///
/// The ledger is final when this runs: a failing notification is logged and
/// the remaining moves are still delivered. Returns the number of failures.
pub fn notify_committed(adapter: &dyn CollateralAdapter, moves: &[(AdapterMove, &[u8])]) -> usize {
    let mut failed = 0;
    for (m, data) in moves {
        if let Err(err) = adapter.on_move_collateral(&m.pool, &m.src, &m.dst, m.amount, data) {
            failed += 1;
            tracing::error!(
                pool = %m.pool,
                dst = %m.dst.short(),
                amount = %m.amount,
                error = %err,
                "collateral adapter notification failed"
            );
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records like [`RecordingAdapter`] but rejects moves to one account
    #[derive(Debug)]
    struct RejectingAdapter {
        inner: RecordingAdapter,
        reject: Address,
    }

    impl CollateralAdapter for RejectingAdapter {
        fn on_move_collateral(
            &self,
            pool: &PoolId,
            src: &Address,
            dst: &Address,
            amount: Wad,
            data: &[u8],
        ) -> Result<()> {
            if *dst == self.reject {
                return Err(Error::Lock);
            }
            self.inner.on_move_collateral(pool, src, dst, amount, data)
        }
    }

    #[test]
    fn test_recording_adapter() {
        let adapter = RecordingAdapter::new();
        let pool = PoolId::from_label("WXDC").unwrap();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");

        adapter.on_move_collateral(&pool, &alice, &bob, Wad::from_units(2), &[]).unwrap();
        adapter.on_move_collateral(&pool, &alice, &bob, Wad::from_units(3), b"x").unwrap();

        assert_eq!(adapter.moves().len(), 2);
        assert_eq!(adapter.received_by(&bob), Wad::from_units(5));
        assert_eq!(adapter.received_by(&alice), Wad::ZERO);
    }

    #[test]
    fn test_notify_committed_delivers_past_failures() {
        let pool = PoolId::from_label("WXDC").unwrap();
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");
        let carol = Address::derive("carol");
        let adapter = RejectingAdapter {
            inner: RecordingAdapter::new(),
            reject: bob,
        };
        let move_to = |dst: Address, units: u64| AdapterMove {
            pool,
            src: alice,
            dst,
            amount: Wad::from_units(units),
        };

        let failed = notify_committed(
            &adapter,
            &[
                (move_to(carol, 1), &[][..]),
                (move_to(bob, 2), &[][..]),
                (move_to(carol, 3), &b"x"[..]),
            ],
        );
        assert_eq!(failed, 1);
        assert_eq!(adapter.inner.received_by(&carol), Wad::from_units(4));
        assert_eq!(adapter.inner.received_by(&bob), Wad::ZERO);
    }
}
