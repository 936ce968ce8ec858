//! Messaging channel: LINE webhook decoding, signature verification, and replies.
//!
//! Inbound webhook bodies are verified with [`signature::verify`] before they are decoded
//! into [`InboundEvent`]s; answers go back out through a [`ReplyChannel`].

mod inbound;
mod line;
mod reply;
pub mod signature;

pub use inbound::InboundEvent;
pub use line::{LineChannel, LineEvent, LineMessage, WebhookPayload};
pub use reply::{DeliveryError, ReplyChannel};
