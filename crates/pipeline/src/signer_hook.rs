//! Wake-up call for the external co-signer after an enqueue.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::{PipelineError, Result};

const HOOK_TIMEOUT: Duration = Duration::from_secs(15);

pub struct SignerHook {
    endpoint: String,
    http: Client,
}

impl SignerHook {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(HOOK_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::SignerHook(e.to_string()))?;
        Ok(Self {
            endpoint: format!("{}/aws/sqs", base_url.trim_end_matches('/')),
            http,
        })
    }

    /// Tell the signer its inbound queue has work. The body is empty;
    /// the queue itself carries the envelope.
    pub async fn trigger(&self) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .send()
            .await
            .map_err(|e| PipelineError::SignerHook(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::SignerHook(format!(
                "signer returned status {}",
                status.as_u16()
            )));
        }
        debug!(endpoint = %self.endpoint, "signer notified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_shape() {
        let hook = SignerHook::new("http://localhost:8081/").unwrap();
        assert_eq!(hook.endpoint, "http://localhost:8081/aws/sqs");
    }
}
