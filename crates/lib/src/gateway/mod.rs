//! Gateway: the relay's HTTP surface.
//!
//! Single port serves the LINE webhook (`POST /callback`) and a health probe (`GET /`).

mod server;

pub use server::{relay_event, router, run_gateway, RelayError, RelayState};
