//! Async dispatcher
//!
//! Network callbacks hand batches to the dispatcher, which applies them one at
//! a time on the blocking thread pool. Batches never run on a network task.

use crate::error::{UtError, UtResult};
use crate::result::BatchSummary;
use crate::updater::UtUpdater;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use utx_primitives::{Hash256, Timestamp};
use utx_types::TransactionInfo;

enum Command {
    New {
        infos: Vec<TransactionInfo>,
        reply: oneshot::Sender<BatchSummary>,
    },
    AfterCommit {
        confirmed_hashes: Vec<Hash256>,
        reverted_infos: Vec<TransactionInfo>,
        reply: oneshot::Sender<BatchSummary>,
    },
    Prune {
        timestamp: Timestamp,
        reply: oneshot::Sender<usize>,
    },
}

impl Command {
    fn apply(self, updater: &UtUpdater) {
        // the submitter may have stopped waiting
        match self {
            Command::New { infos, reply } => {
                let _ = reply.send(updater.update_new(infos));
            }
            Command::AfterCommit {
                confirmed_hashes,
                reverted_infos,
                reply,
            } => {
                let _ = reply.send(updater.update_after_commit(&confirmed_hashes, reverted_infos));
            }
            Command::Prune { timestamp, reply } => {
                let _ = reply.send(updater.prune(timestamp).len());
            }
        }
    }
}

/// Cloneable submission handle
#[derive(Clone)]
pub struct UtDispatcherHandle {
    commands: mpsc::Sender<Command>,
}

impl UtDispatcherHandle {
    /// Queue freshly submitted transactions and wait for the batch summary
    pub async fn submit(&self, infos: Vec<TransactionInfo>) -> UtResult<BatchSummary> {
        let (reply, response) = oneshot::channel();
        self.send(Command::New { infos, reply }).await?;
        response.await.map_err(|_| UtError::DispatcherClosed)
    }

    /// Queue a block commit and wait for the batch summary
    pub async fn submit_after_commit(
        &self,
        confirmed_hashes: Vec<Hash256>,
        reverted_infos: Vec<TransactionInfo>,
    ) -> UtResult<BatchSummary> {
        let (reply, response) = oneshot::channel();
        self.send(Command::AfterCommit {
            confirmed_hashes,
            reverted_infos,
            reply,
        })
        .await?;
        response.await.map_err(|_| UtError::DispatcherClosed)
    }

    /// Queue a deadline prune and wait for the number of removed transactions
    pub async fn prune(&self, timestamp: Timestamp) -> UtResult<usize> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Prune { timestamp, reply }).await?;
        response.await.map_err(|_| UtError::DispatcherClosed)
    }

    async fn send(&self, command: Command) -> UtResult<()> {
        self.commands.send(command).await.map_err(|_| UtError::DispatcherClosed)
    }
}

/// Serializes batches from many producers onto one updater
pub struct UtDispatcher {
    handle: UtDispatcherHandle,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl UtDispatcher {
    /// Start the worker task. Must be called from within a tokio runtime.
    pub fn spawn(updater: Arc<UtUpdater>, queue_capacity: usize) -> Self {
        let (commands, receiver) = mpsc::channel(queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run(updater, receiver, shutdown_rx));

        Self {
            handle: UtDispatcherHandle { commands },
            shutdown,
            worker,
        }
    }

    /// Get a submission handle
    pub fn handle(&self) -> UtDispatcherHandle {
        self.handle.clone()
    }

    /// See [`UtDispatcherHandle::submit`]
    pub async fn submit(&self, infos: Vec<TransactionInfo>) -> UtResult<BatchSummary> {
        self.handle.submit(infos).await
    }

    /// See [`UtDispatcherHandle::submit_after_commit`]
    pub async fn submit_after_commit(
        &self,
        confirmed_hashes: Vec<Hash256>,
        reverted_infos: Vec<TransactionInfo>,
    ) -> UtResult<BatchSummary> {
        self.handle.submit_after_commit(confirmed_hashes, reverted_infos).await
    }

    /// Stop accepting batches, finish the queued ones and wait for the worker
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.worker.await {
            warn!("Dispatcher worker failed: {}", e);
        }
    }
}

async fn run(updater: Arc<UtUpdater>, mut commands: mpsc::Receiver<Command>, mut shutdown: watch::Receiver<bool>) {
    info!("Unconfirmed transactions dispatcher started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => execute(&updater, command).await,
                None => break,
            },
            _ = shutdown.changed() => {
                commands.close();
                while let Some(command) = commands.recv().await {
                    execute(&updater, command).await;
                }
                break;
            }
        }
    }

    info!("Unconfirmed transactions dispatcher stopped");
}

async fn execute(updater: &Arc<UtUpdater>, command: Command) {
    let updater = Arc::clone(updater);
    if let Err(e) = tokio::task::spawn_blocking(move || command.apply(&updater)).await {
        warn!("Batch task failed: {}", e);
    }
}
