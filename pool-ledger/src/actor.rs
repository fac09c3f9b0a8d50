//! Single-writer persistence actor
//!
//! Every durable write goes through one Tokio task, so the backend never sees
//! concurrent writers and a commit is never split by a suspended caller.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │        TransactionProcessor (many concurrent)        │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ WriterHandle::commit(Mutation)
//!                       ▼ mpsc::channel (bounded)
//! ┌──────────────────────────────────────────────────────┐
//! │              StorageWriter (single task)              │
//! │  Batch: Vec<PendingCommit>                            │
//! │  Timer: batch_timeout or max_batch_size → flush       │
//! └─────────────────────┬────────────────────────────────┘
//!                       ▼
//!               Backend::commit(&[Mutation])
//! ```
//!
//! Callers are answered only after their mutation is written.

use crate::{
    config::BatchingConfig,
    metrics::Metrics,
    storage::{Backend, Mutation},
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration};

/// Mailbox capacity
const MAILBOX_CAPACITY: usize = 1000;

/// Message sent to the storage writer
pub enum WriterMessage {
    /// Persist a mutation
    Commit {
        mutation: Mutation,
        response: oneshot::Sender<Result<()>>,
    },

    /// Flush the pending batch immediately
    Flush {
        response: oneshot::Sender<Result<()>>,
    },

    /// Flush and stop
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

struct PendingCommit {
    mutation: Mutation,
    response: oneshot::Sender<Result<()>>,
}

/// Actor that owns the backend's write side
pub struct StorageWriter {
    backend: Arc<dyn Backend>,
    mailbox: mpsc::Receiver<WriterMessage>,
    batch: Vec<PendingCommit>,
    max_batch_size: usize,
    batch_timeout: Duration,
    batching_enabled: bool,
    metrics: Metrics,
}

impl StorageWriter {
    /// Create new actor
    pub fn new(
        backend: Arc<dyn Backend>,
        mailbox: mpsc::Receiver<WriterMessage>,
        batching: &BatchingConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            backend,
            mailbox,
            batch: Vec::with_capacity(batching.max_batch_size),
            max_batch_size: batching.max_batch_size.max(1),
            batch_timeout: Duration::from_millis(batching.batch_timeout_ms.max(1)),
            batching_enabled: batching.enabled,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut batch_timer = interval(self.batch_timeout);
        batch_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.mailbox.recv() => {
                    match msg {
                        Some(WriterMessage::Commit { mutation, response }) => {
                            self.batch.push(PendingCommit { mutation, response });
                            if !self.batching_enabled || self.batch.len() >= self.max_batch_size {
                                let _ = self.flush_batch();
                            }
                        }
                        Some(WriterMessage::Flush { response }) => {
                            let _ = response.send(self.flush_batch());
                        }
                        Some(WriterMessage::Shutdown { response }) => {
                            let _ = response.send(self.flush_batch());
                            tracing::info!("Storage writer stopped");
                            break;
                        }
                        None => {
                            // All handles dropped
                            let _ = self.flush_batch();
                            break;
                        }
                    }
                }

                _ = batch_timer.tick(), if self.batching_enabled && !self.batch.is_empty() => {
                    let _ = self.flush_batch();
                }
            }
        }
    }

    /// Write the pending batch and answer every waiter with the result
    fn flush_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let pending: Vec<PendingCommit> = self.batch.drain(..).collect();
        let mutations: Vec<Mutation> = pending.iter().map(|p| p.mutation.clone()).collect();

        tracing::debug!("Flushing batch of {} commits", mutations.len());
        self.metrics.record_batch_flush(mutations.len());

        let result = self.backend.commit(&mutations);
        if let Err(e) = &result {
            tracing::error!("Error flushing batch: {}", e);
        }

        for commit in pending {
            let reply = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(e.duplicate()),
            };
            let _ = commit.response.send(reply);
        }

        result
    }
}

/// Handle for sending messages to the writer
#[derive(Debug, Clone)]
pub struct WriterHandle {
    sender: mpsc::Sender<WriterMessage>,
}

impl WriterHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<WriterMessage>) -> Self {
        Self { sender }
    }

    /// Persist a mutation, resolving once it is written
    pub async fn commit(&self, mutation: Mutation) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Commit {
                mutation,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Flush batch immediately
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Flush { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Flush and stop the writer
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }
}

/// Spawn the storage writer
pub fn spawn_storage_writer(
    backend: Arc<dyn Backend>,
    batching: &BatchingConfig,
    metrics: Metrics,
) -> WriterHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let writer = StorageWriter::new(backend, rx, batching, metrics);

    tokio::spawn(async move {
        writer.run().await;
    });

    WriterHandle::new(tx)
}
