//! LINE channel: webhook payload decoding and the reply API.

use crate::channels::inbound::InboundEvent;
use crate::channels::reply::{DeliveryError, ReplyChannel};
use crate::config::LineConfig;
use async_trait::async_trait;
use serde::Deserialize;

const LINE_API_BASE: &str = "https://api.line.me";

/// Webhook POST body: `{ "destination": ..., "events": [...] }`.
///
/// Events are kept raw so that one undecodable event does not reject its siblings.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// Webhook event, tagged by `type`. Only message events carry anything we act on.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LineEvent {
    #[serde(rename_all = "camelCase")]
    Message {
        reply_token: String,
        message: LineMessage,
    },
    #[serde(other)]
    Other,
}

/// Message content, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LineMessage {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl WebhookPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Text message events in delivery order. Other kinds, and events that fail to decode, are dropped.
    pub fn text_events(&self) -> Vec<InboundEvent> {
        self.events
            .iter()
            .filter_map(|raw| match LineEvent::deserialize(raw) {
                Ok(LineEvent::Message {
                    reply_token,
                    message: LineMessage::Text { text },
                }) => Some(InboundEvent { reply_token, text }),
                Ok(LineEvent::Message { .. }) => {
                    log::debug!("line: ignoring non-text message event");
                    None
                }
                Ok(LineEvent::Other) => {
                    log::debug!(
                        "line: ignoring event type {}",
                        raw.get("type").and_then(|t| t.as_str()).unwrap_or("?")
                    );
                    None
                }
                Err(e) => {
                    log::warn!("line: dropping undecodable event: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// LINE Messaging API client for the reply endpoint.
pub struct LineChannel {
    id: String,
    api_base: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(access_token: String, config: &LineConfig) -> Result<Self, reqwest::Error> {
        let api_base = config
            .api_base
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            id: "line".to_string(),
            api_base,
            access_token,
            client,
        })
    }

    /// POST /v2/bot/message/reply with a single text message.
    pub async fn reply_message(&self, reply_token: &str, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }],
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl ReplyChannel for LineChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), DeliveryError> {
        self.reply_message(reply_token, text).await
    }
}
