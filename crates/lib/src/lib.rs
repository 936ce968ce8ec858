//! LINE to Vertex AI Search relay: verifies LINE webhooks, asks the answer API, and
//! replies with the answer and its cited links.

pub mod answer;
pub mod channels;
pub mod config;
pub mod format;
pub mod gateway;
