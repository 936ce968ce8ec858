//! Reply seam: how a formatted answer gets back to the chat user.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("reply request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Platform rejected the reply (expired or reused token, bad request, auth).
    #[error("reply rejected: {status} {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Sends one reply per reply token. Tokens are single-use; callers never retry.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), DeliveryError>;
}
