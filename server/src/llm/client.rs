//! HTTP scoring client for OpenAI-compatible chat completion APIs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::db::Article;
use crate::llm::provider::{ModelResult, ProviderError, ScoreProvider};

/// Maximum article content characters sent to a model.
const MAX_CONTENT_CHARS: usize = 12_000;

/// Maximum error-body characters kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Timeout for the credentials probe.
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);

const SCORING_SYSTEM_PROMPT: &str = "You are a media bias analyst. Score the political leaning of the \
article on a scale from -1.0 (strongly left-leaning) to 1.0 (strongly right-leaning), where 0.0 is \
neutral. Respond with a single JSON object: {\"score\": <number>, \"explanation\": \"<one sentence>\"}. \
Output nothing else.";

/// Live scoring client speaking the OpenAI chat completions dialect.
pub struct HttpScoreClient {
    client: Client,
    base_url: String,
    api_key: String,
    default_timeout: Duration,
}

/// Chat completions response envelope.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Score object the model is instructed to emit.
#[derive(Deserialize)]
struct ScorePayload {
    score: f64,
}

impl HttpScoreClient {
    /// Create a client against an OpenAI-compatible base URL (no trailing
    /// slash, e.g. `https://api.example.com/v1`).
    pub fn new(base_url: &str, api_key: &str, default_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            default_timeout,
        }
    }

    /// Map a non-success upstream status to a provider error.
    async fn error_from_response(response: reqwest::Response) -> ProviderError {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ProviderError::RateLimited;
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return ProviderError::Auth(status.to_string());
        }

        let body = response.text().await.unwrap_or_default();
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        ProviderError::Unavailable(format!("{status}: {truncated}"))
    }
}

#[async_trait]
impl ScoreProvider for HttpScoreClient {
    async fn validate_api_key(&self) -> Result<(), ProviderError> {
        let url = format!("{}/models", self.base_url);
        let send = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send();

        let start = Instant::now();
        let response = tokio::time::timeout(VALIDATE_TIMEOUT, send)
            .await
            .map_err(|_| ProviderError::Timeout(start.elapsed().as_millis() as u64))??;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn score_with_model(
        &self,
        article: &Article,
        model: &str,
        timeout: Duration,
    ) -> Result<ModelResult, ProviderError> {
        let content: String = article.content.chars().take(MAX_CONTENT_CHARS).collect();
        let user_prompt = format!("Title: {}\n\n{}", article.title, content);

        let body = serde_json::json!({
            "model": model,
            "messages": [
                {"role": "system", "content": SCORING_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.0,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let start = Instant::now();

        // Scoped timeout covers headers and body; the connect timeout on the
        // client handles dead endpoints underneath it.
        let request = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(Self::error_from_response(response).await);
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            Ok(parsed)
        };

        let parsed = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| ProviderError::Timeout(start.elapsed().as_millis() as u64))??;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ProviderError::Malformed("empty choices".to_string()))?;

        let (score, metadata) = extract_score(content)?;
        Ok(ModelResult { score, metadata })
    }

    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

/// Extract the score JSON object from model output.
///
/// Tolerates fenced code blocks and prose around the object; the score must
/// be a finite number in [-1, 1].
fn extract_score(content: &str) -> Result<(f64, String), ProviderError> {
    let start = content
        .find('{')
        .ok_or_else(|| ProviderError::Malformed("no JSON object in response".to_string()))?;
    let end = content
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| ProviderError::Malformed("unterminated JSON object".to_string()))?;
    let json = &content[start..=end];

    let payload: ScorePayload = serde_json::from_str(json)
        .map_err(|e| ProviderError::Malformed(format!("invalid score JSON: {e}")))?;

    if !payload.score.is_finite() || !(-1.0..=1.0).contains(&payload.score) {
        return Err(ProviderError::Malformed(format!(
            "score {} outside [-1, 1]",
            payload.score
        )));
    }

    Ok((payload.score, json.to_string()))
}
