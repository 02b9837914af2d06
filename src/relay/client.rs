use std::time::Duration;

use reqwest::Client;
use tokio::time::sleep;
use tracing::{info, warn};

use super::Deliverer;
use super::error::DeliveryError;
use super::types::{MailAttachment, SendRequest, SendResponse};
use crate::config::MailConfig;
use crate::convert::PdfAttachment;

/// Backoff for rate-limited sends.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

/// Upper bound on a single rate-limit wait.
pub const MAX_BACKOFF_MS: u64 = 5 * 60 * 1000;

impl RetryPolicy {
    /// delay = base_delay_ms * 2^(attempt - 1), saturating at `u64::MAX`.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        2u64.checked_pow(attempt.saturating_sub(1))
            .and_then(|m| self.base_delay_ms.checked_mul(m))
            .unwrap_or(u64::MAX)
    }

    /// Wait before retry `attempt`: the longer of the relay's hint and the
    /// backoff, capped at [`MAX_BACKOFF_MS`].
    pub fn wait_for(&self, attempt: u32, retry_after_ms: u64) -> Duration {
        Duration::from_millis(retry_after_ms.max(self.delay_for_attempt(attempt)).min(MAX_BACKOFF_MS))
    }
}

/// Sends one message per batch through an HTTP mail relay.
pub struct MailRelayClient {
    api_key: String,
    client: Client,
    base_url: String,
    sender: String,
    recipients: Vec<String>,
    subject: String,
    retry: RetryPolicy,
}

impl MailRelayClient {
    pub fn new(config: &MailConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            api_key: config.api_key.clone(),
            client,
            base_url: config.relay_url.clone(),
            sender: config.sender.clone(),
            recipients: config.recipients.clone(),
            subject: config.subject.clone(),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay_ms: config.base_delay_ms,
            },
        })
    }

    fn build_request(&self, attachments: &[PdfAttachment], date_token: &str) -> SendRequest {
        let names = attachments
            .iter()
            .map(|a| format!("- {}", a.file_name))
            .collect::<Vec<_>>()
            .join("\n");
        SendRequest {
            from: self.sender.clone(),
            to: self.recipients.clone(),
            subject: format!("{} {date_token}", self.subject),
            text: format!("Attached are {} drilling update report(s):\n{names}\n", attachments.len()),
            attachments: attachments.iter().map(MailAttachment::from_pdf).collect(),
        }
    }

    async fn post(&self, req: &SendRequest) -> Result<SendResponse, DeliveryError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(req)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(0);
            return Err(DeliveryError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // Some relays answer 202 with an empty body.
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body).unwrap_or(SendResponse { id: String::new() }))
    }
}

impl Deliverer for MailRelayClient {
    async fn send(&self, attachments: &[PdfAttachment], date_token: &str) -> Result<(), DeliveryError> {
        if self.recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }
        let req = self.build_request(attachments, date_token);

        let mut attempt = 0;
        loop {
            match self.post(&req).await {
                Ok(resp) => {
                    info!(
                        message_id = %resp.id,
                        attachments = attachments.len(),
                        recipients = req.to.len(),
                        "Email with attachments has been sent."
                    );
                    return Ok(());
                }
                Err(DeliveryError::RateLimited { retry_after_ms }) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let wait = self.retry.wait_for(attempt, retry_after_ms);
                    warn!(
                        attempt,
                        max = self.retry.max_retries,
                        delay_ms = wait.as_millis() as u64,
                        "mail relay rate limited, retrying"
                    );
                    sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
