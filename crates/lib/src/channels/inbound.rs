//! Inbound text message from the LINE webhook: one reply token, one query.

/// A text message event awaiting a single reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Single-use token required to reply to this event.
    pub reply_token: String,
    pub text: String,
}
