//! In-memory queue for tests: same at-least-once contract as SQS,
//! including in-flight messages that return to the queue unless
//! deleted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{QueueConsumer, QueueMessage, QueueProducer, Result};

const RECEIVE_BATCH: usize = 10;

#[derive(Default)]
struct MemoryState {
    queues: HashMap<String, VecDeque<String>>,
    in_flight: HashMap<String, (String, String)>,
    next_receipt: u64,
}

#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Messages waiting in a queue (not counting in-flight ones).
    pub fn queued(&self, queue_url: &str) -> usize {
        self.lock().queues.get(queue_url).map_or(0, VecDeque::len)
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Put every undeleted in-flight message back at the front of its
    /// queue, simulating a visibility timeout expiring.
    pub fn redeliver(&self) {
        let mut state = self.lock();
        let in_flight = std::mem::take(&mut state.in_flight);
        for (_, (queue_url, body)) in in_flight {
            state.queues.entry(queue_url).or_default().push_front(body);
        }
    }
}

#[async_trait]
impl QueueProducer for MemoryQueue {
    async fn send(&self, queue_url: &str, body: &str) -> Result<()> {
        self.lock()
            .queues
            .entry(queue_url.to_string())
            .or_default()
            .push_back(body.to_string());
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for MemoryQueue {
    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>> {
        let mut state = self.lock();
        let mut messages = Vec::new();
        for _ in 0..RECEIVE_BATCH {
            let Some(body) = state
                .queues
                .get_mut(queue_url)
                .and_then(VecDeque::pop_front)
            else {
                break;
            };
            state.next_receipt += 1;
            let receipt_handle = format!("rcpt-{}", state.next_receipt);
            state
                .in_flight
                .insert(receipt_handle.clone(), (queue_url.to_string(), body.clone()));
            messages.push(QueueMessage {
                body,
                receipt_handle,
            });
        }
        Ok(messages)
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.lock().in_flight.remove(receipt_handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE: &str = "mem://to-signer";

    #[tokio::test]
    async fn test_send_receive_delete() {
        let queue = MemoryQueue::new();
        queue.send(QUEUE, "one").await.unwrap();
        queue.send(QUEUE, "two").await.unwrap();
        assert_eq!(queue.queued(QUEUE), 2);

        let messages = queue.receive(QUEUE).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "one");
        assert_eq!(queue.queued(QUEUE), 0);
        assert_eq!(queue.in_flight(), 2);

        for message in &messages {
            queue.delete(QUEUE, &message.receipt_handle).await.unwrap();
        }
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_undeleted_messages_redeliver() {
        let queue = MemoryQueue::new();
        queue.send(QUEUE, "sticky").await.unwrap();

        let first = queue.receive(QUEUE).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(queue.receive(QUEUE).await.unwrap().is_empty());

        queue.redeliver();
        let second = queue.receive(QUEUE).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "sticky");
        assert_ne!(second[0].receipt_handle, first[0].receipt_handle);
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let queue = MemoryQueue::new();
        queue.send("mem://a", "for-a").await.unwrap();
        assert!(queue.receive("mem://b").await.unwrap().is_empty());
        assert_eq!(queue.receive("mem://a").await.unwrap().len(), 1);
    }
}
