//! OAuth2 access tokens for the Discovery Engine API.
//!
//! A static token (GOOGLE_ACCESS_TOKEN) wins; otherwise tokens come from the GCE / Cloud Run
//! metadata server and are cached until shortly before they expire.

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Metadata tokens live about an hour; longer claims are clamped.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("metadata token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("metadata server error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Fetches service-account tokens from the metadata server.
pub struct MetadataTokenSource {
    url: String,
    client: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_url(METADATA_TOKEN_URL, timeout)
    }

    pub fn with_url(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
            cached: RwLock::new(None),
        })
    }

    pub async fn token(&self) -> Result<String, TokenError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }
        let mut guard = self.cached.write().await;
        // Another request may have refreshed while we waited for the write lock.
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }
        let fresh = self.fetch().await?;
        let now = Instant::now();
        let refresh_at = refresh_deadline(now, fresh.expires_in);
        log::debug!(
            "metadata token refreshed, valid for {}s",
            refresh_at.saturating_duration_since(now).as_secs()
        );
        *guard = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at,
        });
        Ok(fresh.access_token)
    }

    async fn fetch(&self) -> Result<MetadataTokenResponse, TokenError> {
        let res = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(TokenError::Api(format!("{} {}", status, body)));
        }
        let data: MetadataTokenResponse = res.json().await?;
        if data.access_token.is_empty() {
            return Err(TokenError::Api("empty access_token".to_string()));
        }
        Ok(data)
    }
}

/// When a token reported to live `expires_in` seconds should be refetched.
fn refresh_deadline(now: Instant, expires_in: u64) -> Instant {
    let lifetime = Duration::from_secs(expires_in)
        .min(MAX_TOKEN_LIFETIME)
        .saturating_sub(REFRESH_MARGIN);
    now.checked_add(lifetime).unwrap_or(now)
}

/// Where bearer tokens for the answer API come from.
pub enum TokenSource {
    Static(String),
    Metadata(MetadataTokenSource),
}

impl TokenSource {
    /// Static token when given, metadata server otherwise.
    pub fn resolve(static_token: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        match static_token {
            Some(token) => Ok(TokenSource::Static(token)),
            None => Ok(TokenSource::Metadata(MetadataTokenSource::new(timeout)?)),
        }
    }

    pub async fn token(&self) -> Result<String, TokenError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata(source) => source.token().await,
        }
    }
}
