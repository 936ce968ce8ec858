//! Answer query response types and normalization into [`AnswerResult`].

use serde::Deserialize;

/// Only this many cited results are carried downstream.
pub const MAX_CITED_RESULTS: usize = 3;

/// Structured answer handed to the formatter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerResult {
    pub answer_text: String,
    /// Supporting search results in the order the service returned them (at most three).
    pub cited_results: Vec<CitedResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitedResult {
    pub title: String,
    pub uri: String,
}

/// `POST ...:answer` response body (subset).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerQueryResponse {
    #[serde(default)]
    pub answer: Option<Answer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(default)]
    pub answer_text: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub observation: Option<Observation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub search_results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: String,
}

impl From<Answer> for AnswerResult {
    /// Citations are the first step's first action's observed search results.
    fn from(answer: Answer) -> Self {
        let cited_results = answer
            .steps
            .into_iter()
            .next()
            .and_then(|step| step.actions.into_iter().next())
            .and_then(|action| action.observation)
            .map(|observation| observation.search_results)
            .unwrap_or_default()
            .into_iter()
            .take(MAX_CITED_RESULTS)
            .map(|r| CitedResult {
                title: r.title,
                uri: r.uri,
            })
            .collect();
        AnswerResult {
            answer_text: answer.answer_text,
            cited_results,
        }
    }
}
