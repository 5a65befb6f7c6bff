//! Vote ingestion: the boundary between the vote relay and the tally.
//!
//! [`VoteIngestion`] is the synchronous adapter; [`IngestionQueue`] puts a
//! bounded async queue in front of it and runs each notification on the
//! blocking pool, since the tally writes to durable storage.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use voteparty_types::VoteNotification;

use crate::tally::{VoteOutcome, VoteTally};
use crate::EngineError;

pub struct VoteIngestion {
    tally: Arc<VoteTally>,
}

impl VoteIngestion {
    pub fn new(tally: Arc<VoteTally>) -> Self {
        Self { tally }
    }

    /// Forward one notification to the tally.
    ///
    /// A blank subject is rejected, and a panic while recording is caught and
    /// logged; either way `None` is returned and the next notification is
    /// processed normally.
    pub fn handle(&self, notification: &VoteNotification) -> Option<VoteOutcome> {
        let subject = notification.subject_id.trim();
        if subject.is_empty() {
            tracing::warn!(received_at = %notification.received_at, "ignoring vote with blank subject");
            return None;
        }

        let tally = &self.tally;
        match panic::catch_unwind(AssertUnwindSafe(|| tally.record_vote(subject))) {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                tracing::error!(subject, "error processing vote");
                None
            }
        }
    }
}

/// Bounded queue of pending notifications drained by one worker task.
#[derive(Clone)]
pub struct IngestionQueue {
    tx: mpsc::Sender<VoteNotification>,
}

impl IngestionQueue {
    /// Start the worker. It stops when every queue handle is dropped or when
    /// `shutdown` fires; in the latter case notifications already queued are
    /// still processed. The join handle yields the number processed.
    pub fn spawn(
        ingestion: Arc<VoteIngestion>,
        capacity: usize,
        mut shutdown: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<u64>) {
        let (tx, mut rx) = mpsc::channel::<VoteNotification>(capacity.max(1));

        let worker = tokio::spawn(async move {
            let mut processed = 0u64;
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        rx.close();
                        while let Some(notification) = rx.recv().await {
                            processed += process(&ingestion, notification).await;
                        }
                        break;
                    }
                    next = rx.recv() => match next {
                        Some(notification) => processed += process(&ingestion, notification).await,
                        None => break,
                    },
                }
            }
            tracing::debug!(processed, "ingestion worker stopped");
            processed
        });

        (Self { tx }, worker)
    }

    /// Queue a notification, waiting for space.
    pub async fn submit(&self, notification: VoteNotification) -> Result<(), EngineError> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| EngineError::QueueClosed)
    }
}

async fn process(ingestion: &Arc<VoteIngestion>, notification: VoteNotification) -> u64 {
    let ingestion = Arc::clone(ingestion);
    match tokio::task::spawn_blocking(move || ingestion.handle(&notification)).await {
        Ok(_) => 1,
        Err(e) => {
            tracing::error!(error = %e, "ingestion task failed");
            0
        }
    }
}
