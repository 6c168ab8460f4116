//! Event generation
//!
//! Sends chat completions to a provider, turns each response into an
//! [`Event`] and posts it to the events endpoint that feeds the metrics API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::EventsConfig;
use crate::error::{Error, Result};
use crate::models::Event;

/// Response header carrying the provider-side processing time
pub const PROCESSING_MS_HEADER: &str = "openai-processing-ms";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Messages sent on every probe request
pub fn default_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", "You are a helpful assistant."),
        ChatMessage::new("user", "Please say something nice."),
    ]
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    id: String,
    created: i64,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Sends chat completions and records them as events
pub struct CompletionProbe {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CompletionProbe {
    /// Create a probe against `base_url` (e.g. `https://api.openai.com/v1`)
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Send one chat completion and describe it as an event
    pub async fn process(
        &self,
        model: &str,
        messages: &[ChatMessage],
        group_id: &str,
    ) -> Result<Event> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        info!(model, "Sending request to provider");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatCompletionRequest { model, messages })
            .send()
            .await
            .map_err(|e| Error::Provider {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        let processing_time = response
            .headers()
            .get(PROCESSING_MS_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await.map_err(|e| Error::Provider {
            status: status.as_u16(),
            message: e.to_string(),
        })?;
        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        let event = Event {
            id: completion.id,
            model: model.to_string(),
            group_id: group_id.to_string(),
            processing_time,
            req_tokens: completion.usage.prompt_tokens,
            resp_tokens: completion.usage.completion_tokens,
            timestamp: completion.created,
        };

        info!("Request processed successfully");
        debug!(event = ?event, "Built event");
        Ok(event)
    }
}

/// Posts events to the events endpoint
pub struct EventSender {
    client: Client,
    url: String,
    api_key: String,
}

impl EventSender {
    /// Create a sender for `url`
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    /// Post a single event
    pub async fn send(&self, event: &Event) -> Result<()> {
        info!(event_id = %event.id, "Sending event");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(event)
            .send()
            .await
            .map_err(|e| Error::EventRejected {
                status: None,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EventRejected {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        info!(event_id = %event.id, "Event sent successfully");
        Ok(())
    }
}

/// Outcome of a generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Requests that completed at the provider
    pub processed: usize,
    /// Events accepted by the events endpoint
    pub sent: usize,
    /// Events the endpoint rejected
    pub failed_sends: usize,
}

/// Run `config.num_requests` probe-and-send iterations, one at a time.
///
/// A provider failure stops the run; a rejected event is logged and the run
/// carries on.
pub async fn generate(
    probe: &CompletionProbe,
    sender: &EventSender,
    config: &EventsConfig,
) -> Result<GenerationReport> {
    let messages = default_messages();
    let total = config.num_requests;
    let mut report = GenerationReport::default();

    for i in 1..=total {
        info!("Processing request {i} of {total}");
        let event = probe.process(&config.model, &messages, &config.group_id).await?;
        report.processed += 1;

        match sender.send(&event).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                error!(error = %e, "Failed to send event");
                report.failed_sends += 1;
            }
        }
        info!("Completed request {i} of {total}");
    }

    Ok(report)
}
