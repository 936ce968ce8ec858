//! Answer generation via Vertex AI Search (Discovery Engine).
//!
//! Sends the user's query with a fixed persona preamble and returns the answer text plus
//! up to three cited search results.

mod client;
mod response;
mod token;

pub use client::{
    api_base_for_location, parse_answer_response, AnswerError, AnswerRequest, Answerer,
    DiscoveryEngineClient, DEFAULT_PREAMBLE,
};
pub use response::{AnswerResult, CitedResult, MAX_CITED_RESULTS};
pub use token::{MetadataTokenSource, TokenError, TokenSource};
