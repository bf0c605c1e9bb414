//! Async single-writer service.
//!
//! One tokio task, the [`ProtocolService`], owns the [`ProtocolEngine`] and applies commands from an
//! mpsc queue in arrival order. Callers hold a cloneable [`ServiceHandle`]
//! and await a oneshot reply per command.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::types::Address;
use crate::error::{Error, Result};
use crate::protocol::events::EventRecord;
use crate::protocol::operations::{Operation, OperationResult};
use crate::protocol::state_machine::ProtocolEngine;

/// Command queued to the service task
#[derive(Debug)]
pub enum Command {
    /// Execute an operation
    Execute {
        /// Caller
        caller: Address,
        /// Operation
        op: Operation,
        /// Reply channel
        reply: oneshot::Sender<Result<OperationResult>>,
    },
    /// Enter a new block
    BeginBlock {
        /// Block height
        height: u64,
        /// Block timestamp
        timestamp: u64,
        /// Reply channel
        reply: oneshot::Sender<Result<()>>,
    },
    /// Events from position `from` on
    EventsSince {
        /// First sequence number
        from: usize,
        /// Reply channel
        reply: oneshot::Sender<Vec<EventRecord>>,
    },
    /// Serialized ledger state
    Snapshot {
        /// Reply channel
        reply: oneshot::Sender<Result<Vec<u8>>>,
    },
}

/// Cloneable sender side of the service
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Command>,
}

impl ServiceHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| Error::Lock)?;
        rx.await.map_err(|_| Error::Lock)
    }

    /// Execute one operation
    pub async fn execute(&self, caller: Address, op: Operation) -> Result<OperationResult> {
        self.request(|reply| Command::Execute { caller, op, reply }).await?
    }

    /// Enter a new block
    pub async fn begin_block(&self, height: u64, timestamp: u64) -> Result<()> {
        self.request(|reply| Command::BeginBlock {
            height,
            timestamp,
            reply,
        })
        .await?
    }

    /// Events from position `from` on
    pub async fn events_since(&self, from: usize) -> Result<Vec<EventRecord>> {
        self.request(|reply| Command::EventsSince { from, reply }).await
    }

    /// Serialized ledger state
    pub async fn snapshot(&self) -> Result<Vec<u8>> {
        self.request(|reply| Command::Snapshot { reply }).await?
    }
}

/// Task owning the engine
#[derive(Debug)]
pub struct ProtocolService {
    engine: ProtocolEngine,
    rx: mpsc::Receiver<Command>,
}

impl ProtocolService {
    /// Spawn the service task; it stops and returns the engine once every
    /// handle is dropped
    pub fn spawn(engine: ProtocolEngine, capacity: usize) -> (ServiceHandle, JoinHandle<ProtocolEngine>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let service = Self { engine, rx };
        (ServiceHandle { tx }, tokio::spawn(service.run()))
    }

    async fn run(mut self) -> ProtocolEngine {
        tracing::info!("protocol service started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }
        tracing::info!("protocol service stopped");
        self.engine
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Execute { caller, op, reply } => {
                let _ = reply.send(self.engine.execute(&caller, op));
            }
            Command::BeginBlock {
                height,
                timestamp,
                reply,
            } => {
                let _ = reply.send(self.engine.begin_block(height, timestamp));
            }
            Command::EventsSince { from, reply } => {
                let _ = reply.send(self.engine.ledger().events().since(from).to_vec());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot_bytes());
            }
        }
    }
}
