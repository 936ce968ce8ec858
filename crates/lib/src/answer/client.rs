//! Vertex AI Search (Discovery Engine) answer query client.
//!
//! One stateless `servingConfigs/*:answer` call per user message: no session is sent, so
//! every query starts a fresh conversation.

use crate::answer::response::{AnswerQueryResponse, AnswerResult};
use crate::answer::token::{TokenError, TokenSource};
use crate::config::AnswerConfig;
use async_trait::async_trait;
use serde::Serialize;

const GLOBAL_API_BASE: &str = "https://discoveryengine.googleapis.com";

/// Persona and style rules given to the answer generator.
pub const DEFAULT_PREAMBLE: &str = "你是一個旅遊網站的 AI 助手，名字叫做可樂，你的任務是根據使用者的搜尋結果，產生更具體且吸引人的說明文字，以提升點擊率。將用戶給予的輸入文字截取實體，依據實體回答，給定一個用戶和可樂之間的對話以及一些搜尋結果，為妳創建一個最終答案。答案應使用搜尋結果中的所有相關信息，不引入任何額外信息，並盡可能使用與搜尋結果完全相同的詞。妳的答案不應超過 800字元數，儘量使用條列式並整理成易讀編排回答，關於價錢只要回覆有近似值的答案。使用使用者的問題語系回答。回答中相同行程的URL，只需要出現在最開頭。不使用markdown語法。找不到相關資訊時，請統一回覆請輸入更詳細資訊";

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("answer request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("answer api error: {status} {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("access token unavailable: {0}")]
    Token(#[from] TokenError),
    #[error("malformed answer response: {0}")]
    Malformed(String),
}

impl AnswerError {
    /// True for transport, status, and auth failures; false for a response we could not interpret.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, AnswerError::Malformed(_))
    }
}

/// One query against one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    pub project_id: String,
    pub location: String,
    pub engine_id: String,
    pub query: String,
}

impl AnswerRequest {
    /// Serving config resource name for the engine's default serving config.
    pub fn serving_config(&self) -> String {
        format!(
            "projects/{}/locations/{}/collections/default_collection/engines/{}/servingConfigs/default_serving_config",
            self.project_id, self.location, self.engine_id
        )
    }
}

/// Regional endpoint for non-global locations.
pub fn api_base_for_location(location: &str) -> String {
    if location == "global" {
        GLOBAL_API_BASE.to_string()
    } else {
        format!("https://{}-discoveryengine.googleapis.com", location)
    }
}

/// Produces an answer for a user query.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResult, AnswerError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerQueryRequest<'a> {
    query: QueryText<'a>,
    query_understanding_spec: serde_json::Map<String, serde_json::Value>,
    answer_generation_spec: AnswerGenerationSpec<'a>,
}

#[derive(Debug, Serialize)]
struct QueryText<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerGenerationSpec<'a> {
    answer_language_code: &'a str,
    ignore_adversarial_query: bool,
    ignore_non_answer_seeking_query: bool,
    ignore_low_relevant_content: bool,
    model_spec: ModelSpec<'a>,
    prompt_spec: PromptSpec<'a>,
    include_citations: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelSpec<'a> {
    model_version: &'a str,
}

#[derive(Debug, Serialize)]
struct PromptSpec<'a> {
    preamble: &'a str,
}

/// Client for the Discovery Engine answer API.
pub struct DiscoveryEngineClient {
    client: reqwest::Client,
    tokens: TokenSource,
    api_base: Option<String>,
    language_code: String,
    model_version: String,
    preamble: String,
}

impl DiscoveryEngineClient {
    pub fn new(config: &AnswerConfig, tokens: TokenSource) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            tokens,
            api_base: config
                .api_base
                .as_deref()
                .map(|u| u.trim_end_matches('/').to_string()),
            language_code: config.language_code.clone(),
            model_version: config.model_version.clone(),
            preamble: config
                .preamble
                .clone()
                .unwrap_or_else(|| DEFAULT_PREAMBLE.to_string()),
        })
    }

    fn endpoint(&self, request: &AnswerRequest) -> String {
        let base = self
            .api_base
            .clone()
            .unwrap_or_else(|| api_base_for_location(&request.location));
        format!("{}/v1/{}:answer", base, request.serving_config())
    }

    fn request_body<'a>(&'a self, query: &'a str) -> AnswerQueryRequest<'a> {
        AnswerQueryRequest {
            query: QueryText { text: query },
            query_understanding_spec: serde_json::Map::new(),
            answer_generation_spec: AnswerGenerationSpec {
                answer_language_code: &self.language_code,
                ignore_adversarial_query: false,
                ignore_non_answer_seeking_query: false,
                ignore_low_relevant_content: false,
                model_spec: ModelSpec {
                    model_version: &self.model_version,
                },
                prompt_spec: PromptSpec {
                    preamble: &self.preamble,
                },
                include_citations: true,
            },
        }
    }
}

/// Decode an answer response body; a body without `answer` is malformed.
pub fn parse_answer_response(body: &[u8]) -> Result<AnswerResult, AnswerError> {
    let data: AnswerQueryResponse =
        serde_json::from_slice(body).map_err(|e| AnswerError::Malformed(e.to_string()))?;
    let answer = data
        .answer
        .ok_or_else(|| AnswerError::Malformed("response has no answer".to_string()))?;
    Ok(AnswerResult::from(answer))
}

#[async_trait]
impl Answerer for DiscoveryEngineClient {
    async fn answer(&self, request: &AnswerRequest) -> Result<AnswerResult, AnswerError> {
        let url = self.endpoint(request);
        let token = self.tokens.token().await?;
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&self.request_body(&request.query))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AnswerError::Api { status, body });
        }
        let body = res.bytes().await?;
        parse_answer_response(&body)
    }
}
