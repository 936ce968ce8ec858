//! Shared helpers for relay integration tests.
#![allow(dead_code)]

use relay::config::{Config, RelayConfig};
use std::collections::HashMap;

pub const CHANNEL_SECRET: &str = "test-channel-secret";

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Resolved config without touching the process environment.
pub fn test_config(settings: Config) -> RelayConfig {
    let env: HashMap<&str, &str> = HashMap::from([
        ("ChannelSecret", CHANNEL_SECRET),
        ("ChannelAccessToken", "test-access-token"),
        ("ProjectId", "test-project"),
        ("Location", "global"),
        ("EngineId", "test-engine"),
        ("GOOGLE_ACCESS_TOKEN", "ya29.test"),
    ]);
    RelayConfig::resolve(settings, |k| env.get(k).map(|v| v.to_string())).expect("test config")
}

/// Webhook body with one text message event per (reply token, text).
pub fn text_events_body(events: &[(&str, &str)]) -> String {
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|(token, text)| {
            serde_json::json!({
                "type": "message",
                "mode": "active",
                "timestamp": 1700000000000u64,
                "source": { "type": "user", "userId": "U123" },
                "replyToken": token,
                "message": { "type": "text", "id": "100", "text": text }
            })
        })
        .collect();
    serde_json::json!({ "destination": "Ubot", "events": events }).to_string()
}
