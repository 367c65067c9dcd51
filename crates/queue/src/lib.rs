//! Pennyworth Queue
//!
//! Producer/consumer seam over the two signer queues. The production
//! implementation speaks the SQS JSON protocol over HTTP; the in-memory
//! implementation backs tests. Delivery is at-least-once either way, so
//! consumers must be idempotent.

pub mod memory;
pub mod sqs;

pub use memory::MemoryQueue;
pub use sqs::SqsQueue;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("queue returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("not a usable queue url: {0}")]
    InvalidQueueUrl(String),
    #[error("queue response was malformed: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// One received message with the handle needed to delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
}

#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// Enqueue a message body. At-least-once: a success means the queue
    /// has it, not that it will be delivered exactly once.
    async fn send(&self, queue_url: &str, body: &str) -> Result<()>;
}

#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Long-poll for messages; returns zero or more.
    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>>;

    /// Permanently remove a delivered message. Only call after the
    /// message's effects are committed.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;
}
