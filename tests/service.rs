//! Async service: concurrent clients funnel through one writer.

#![cfg(feature = "async-service")]

mod common;

use common::{engine_with_pools, W};
use stablecoin_core::prelude::*;
use stablecoin_core::protocol::service::ProtocolService;

#[tokio::test]
async fn test_concurrent_clients_are_serialized() {
    let (mut engine, pools) = engine_with_pools(&["WXDC"]);
    let pool = pools[0];
    let users: Vec<Address> = (0..8).map(|i| Address::derive(&format!("user-{}", i))).collect();
    for user in &users {
        engine.deposit_collateral(&pool, user, Wad::from_units(100)).unwrap();
    }
    let (handle, task) = ProtocolService::spawn(engine, 4);

    let mut clients = Vec::new();
    for user in users.clone() {
        let handle = handle.clone();
        clients.push(tokio::spawn(async move {
            handle
                .execute(
                    user,
                    Operation::AdjustPosition {
                        pool,
                        position_owner: user,
                        collateral_owner: user,
                        stablecoin_owner: user,
                        collateral_delta: 100 * W,
                        debt_share_delta: 50 * W,
                    },
                )
                .await
        }));
    }
    for client in clients {
        client.await.unwrap().unwrap();
    }

    let events = handle.events_since(0).await.unwrap();
    let adjusted = events
        .iter()
        .filter(|r| r.event.event_type() == "PositionAdjusted")
        .count();
    assert_eq!(adjusted, users.len());
    let sequences: Vec<u64> = events.iter().map(|r| r.sequence).collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));

    drop(handle);
    let engine = task.await.unwrap();
    assert_eq!(engine.ledger().total_stablecoin_issued(), Rad::from_units(400));
}

#[tokio::test]
async fn test_closed_service_reports_unavailable() {
    let (engine, _) = engine_with_pools(&["WXDC"]);
    let (handle, task) = ProtocolService::spawn(engine, 1);
    task.abort();
    let _ = task.await;
    let err = handle.begin_block(2, 2_000).await.unwrap_err();
    assert!(matches!(err, Error::Lock));
}
