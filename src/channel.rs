//! Outbound messaging channel
//!
//! The engine treats the provider as an opaque capability: give it a phone number and a
//! payload, get back accepted or rejected. Rejections (including provider rate limiting and
//! transport errors) are ordinary per-recipient data, never engine errors, and the engine
//! never retries a send on its own.

use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::types::MessagePayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of handing one message to the channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Provider accepted the message
    Delivered {
        /// Provider-side message ID, when the provider returns one
        provider_message_id: Option<String>,
    },
    /// Provider rejected the message or could not be reached
    Failed {
        /// Opaque error string
        error: String,
    },
}

impl SendOutcome {
    /// Whether the provider accepted the message
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// Capability that transmits a message to one phone number
///
/// Implementations are shared by every running campaign and the automation poller, so they
/// must tolerate concurrent calls.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Send `payload` to `phone`
    async fn send(&self, phone: &str, payload: &MessagePayload) -> SendOutcome;
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    payload: &'a MessagePayload,
}

#[derive(Deserialize, Default)]
struct ProviderAck {
    #[serde(default, alias = "id")]
    message_id: Option<String>,
}

/// Longest provider error body kept in a recipient's error message
const MAX_ERROR_BODY: usize = 200;

/// [`ChannelSender`] that posts JSON to an HTTP provider
///
/// Each message is a `POST {endpoint}/messages` with body `{"to": phone, "payload": {...}}`
/// and an optional bearer token. Any 2xx is a delivery; the provider message ID is read from
/// `message_id` (or `id`) in the response body when present.
pub struct HttpChannelSender {
    client: reqwest::Client,
    messages_url: url::Url,
    api_token: Option<String>,
}

impl HttpChannelSender {
    /// Build a sender for `endpoint`
    pub fn new(endpoint: &str, config: &ChannelConfig) -> Result<Self> {
        let base = url::Url::parse(endpoint).map_err(|e| Error::Config {
            message: format!("invalid channel endpoint '{endpoint}': {e}"),
            key: Some("channel.endpoint".to_string()),
        })?;
        let messages_url = base
            .join(&format!("{}/messages", base.path().trim_end_matches('/')))
            .map_err(|e| Error::Config {
                message: format!("invalid channel endpoint '{endpoint}': {e}"),
                key: Some("channel.endpoint".to_string()),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            messages_url,
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl ChannelSender for HttpChannelSender {
    async fn send(&self, phone: &str, payload: &MessagePayload) -> SendOutcome {
        let mut request = self
            .client
            .post(self.messages_url.clone())
            .json(&OutboundMessage { to: phone, payload });

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "channel request failed");
                return SendOutcome::Failed {
                    error: format!("transport error: {e}"),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return SendOutcome::Failed {
                error: format!("provider returned {status}: {body}"),
            };
        }

        // A 2xx with an unparseable body is still a delivery, just without an ID
        let ack = response.json::<ProviderAck>().await.unwrap_or_default();
        SendOutcome::Delivered {
            provider_message_id: ack.message_id,
        }
    }
}

/// [`ChannelSender`] that accepts every message without sending it anywhere
///
/// Used when no provider endpoint is configured, e.g. for dry runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopbackSender;

#[async_trait]
impl ChannelSender for LoopbackSender {
    async fn send(&self, phone: &str, payload: &MessagePayload) -> SendOutcome {
        tracing::debug!(phone, kind = payload.kind(), "loopback channel accepted message");
        SendOutcome::Delivered {
            provider_message_id: None,
        }
    }
}

/// Build the sender described by `config`
pub fn from_config(config: &ChannelConfig) -> Result<Arc<dyn ChannelSender>> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpChannelSender::new(endpoint, config)?)),
        None => {
            tracing::info!("no channel endpoint configured, messages will not leave the process");
            Ok(Arc::new(LoopbackSender))
        }
    }
}
