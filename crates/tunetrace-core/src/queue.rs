//! Ingestion job queue

use crate::error::{Result, TuneTraceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Payload handed to the ingestion worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestJob {
    pub track_id: String,
    pub storage_key: String,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: IngestJob) -> Result<()>;
}

/// In-process queue over an unbounded channel
#[derive(Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<IngestJob>,
}

impl ChannelQueue {
    /// Create the queue and the receiver the worker drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IngestJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    async fn enqueue(&self, job: IngestJob) -> Result<()> {
        log::debug!("Queued ingestion of {}", job.track_id);
        self.sender.send(job).map_err(|e| {
            TuneTraceError::Queue(format!("worker is gone, dropped job {}", e.0.track_id))
        })
    }
}
