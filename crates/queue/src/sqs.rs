//! SQS client speaking the JSON protocol.
//!
//! Requests go to the queue's endpoint with an `X-Amz-Target` action
//! header and the queue url in the body. Request signing is left to the
//! deployment boundary (instance roles or an egress proxy); the wire
//! shapes here are the standard SQS JSON API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{QueueConsumer, QueueError, QueueMessage, QueueProducer, Result};

const AMZ_JSON: &str = "application/x-amz-json-1.0";
const DEFAULT_WAIT_SECS: u32 = 20;
const DEFAULT_MAX_MESSAGES: u32 = 10;

pub struct SqsQueue {
    http: Client,
    wait_time_secs: u32,
    max_messages: u32,
}

#[derive(Debug, Deserialize)]
struct ReceiveResponse {
    #[serde(rename = "Messages", default)]
    messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
struct ReceivedMessage {
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: String,
}

impl SqsQueue {
    pub fn new() -> Result<Self> {
        Self::with_wait(DEFAULT_WAIT_SECS)
    }

    /// Long-poll wait in seconds; the HTTP timeout leaves headroom on
    /// top of it.
    pub fn with_wait(wait_time_secs: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(wait_time_secs as u64 + 10))
            .build()?;
        Ok(Self {
            http,
            wait_time_secs,
            max_messages: DEFAULT_MAX_MESSAGES,
        })
    }

    fn endpoint(queue_url: &str) -> Result<String> {
        let url = Url::parse(queue_url)
            .map_err(|_| QueueError::InvalidQueueUrl(queue_url.to_string()))?;
        match (url.scheme(), url.host_str()) {
            (scheme @ ("http" | "https"), Some(host)) => Ok(match url.port() {
                Some(port) => format!("{scheme}://{host}:{port}"),
                None => format!("{scheme}://{host}"),
            }),
            _ => Err(QueueError::InvalidQueueUrl(queue_url.to_string())),
        }
    }

    async fn call(&self, action: &str, queue_url: &str, body: Value) -> Result<Value> {
        let endpoint = Self::endpoint(queue_url)?;
        let response = self
            .http
            .post(endpoint)
            .header("X-Amz-Target", format!("AmazonSQS.{action}"))
            .header(CONTENT_TYPE, AMZ_JSON)
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueueError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| QueueError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl QueueProducer for SqsQueue {
    async fn send(&self, queue_url: &str, body: &str) -> Result<()> {
        self.call(
            "SendMessage",
            queue_url,
            json!({ "QueueUrl": queue_url, "MessageBody": body }),
        )
        .await?;
        debug!(queue_url, bytes = body.len(), "message sent");
        Ok(())
    }
}

#[async_trait]
impl QueueConsumer for SqsQueue {
    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>> {
        let value = self
            .call(
                "ReceiveMessage",
                queue_url,
                json!({
                    "QueueUrl": queue_url,
                    "MaxNumberOfMessages": self.max_messages,
                    "WaitTimeSeconds": self.wait_time_secs,
                }),
            )
            .await?;

        if value.is_null() {
            return Ok(Vec::new());
        }
        let parsed: ReceiveResponse = serde_json::from_value(value)
            .map_err(|e| QueueError::Malformed(e.to_string()))?;
        Ok(parsed
            .messages
            .into_iter()
            .map(|m| QueueMessage {
                body: m.body,
                receipt_handle: m.receipt_handle,
            })
            .collect())
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.call(
            "DeleteMessage",
            queue_url,
            json!({ "QueueUrl": queue_url, "ReceiptHandle": receipt_handle }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_queue_url() {
        assert_eq!(
            SqsQueue::endpoint("https://sqs.us-east-1.amazonaws.com/123/roundups-to-signer")
                .unwrap(),
            "https://sqs.us-east-1.amazonaws.com"
        );
        assert_eq!(
            SqsQueue::endpoint("http://localhost:9324/queue/roundups").unwrap(),
            "http://localhost:9324"
        );
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(matches!(
            SqsQueue::endpoint("not a url"),
            Err(QueueError::InvalidQueueUrl(_))
        ));
        assert!(matches!(
            SqsQueue::endpoint("file:///tmp/queue"),
            Err(QueueError::InvalidQueueUrl(_))
        ));
    }

    #[test]
    fn test_receive_response_parsing() {
        let parsed: ReceiveResponse = serde_json::from_str(
            r#"{"Messages":[{"Body":"{}","ReceiptHandle":"rh-1","MessageId":"m-1"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.messages[0].receipt_handle, "rh-1");

        let empty: ReceiveResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.messages.is_empty());
    }
}
