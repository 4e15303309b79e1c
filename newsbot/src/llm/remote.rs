use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmProvider, LlmRequest, LlmResponse, Summary, UsageMetadata};

/// Remote LLM provider using OpenAI-compatible HTTP API
pub struct RemoteLlmProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 500,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(
        mut self,
        timeout_secs: u64,
        max_tokens: usize,
        temperature: f32,
    ) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    /// Embeddings endpoint derived from the chat endpoint,
    /// e.g. http://localhost:11434/v1/chat/completions -> http://localhost:11434/v1/embeddings
    pub fn embeddings_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/embeddings") {
            base.to_string()
        } else if let Some(root) = base.strip_suffix("/chat/completions") {
            format!("{}/embeddings", root)
        } else if let Some(root) = base.strip_suffix("/completions") {
            format!("{}/embeddings", root)
        } else {
            format!("{}/embeddings", base)
        }
    }

    /// POST a JSON body with auth and return the response body. The deadline
    /// covers the whole exchange, body included; non-2xx becomes an error
    /// carrying the status code.
    async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
        what: &str,
    ) -> Result<String> {
        let exchange = async {
            let response = self
                .client
                .post(url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await
                .with_context(|| format!("{} HTTP request failed", what))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read {} response body", what))?;

            if !status.is_success() {
                anyhow::bail!("{} API error {}: {} (URL: {})", what, status, text, url);
            }
            Ok::<_, anyhow::Error>(text)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .with_context(|| format!("{} request timed out", what))?
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let req_body = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt,
            }],
            max_tokens: Some(request.max_tokens.unwrap_or(self.default_max_tokens)),
            temperature: Some(request.temperature.unwrap_or(self.default_temperature)),
        };

        let body = self.post_json(&self.base_url, &req_body, timeout, "LLM").await?;

        let resp_body: OpenAiResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse LLM response (Body: {})", body))?;

        let choice = resp_body
            .choices
            .into_iter()
            .next()
            .context("LLM response has no choices")?;

        let usage = resp_body.usage.unwrap_or_default();
        let usage = UsageMetadata {
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
            total_tokens: usage.total_tokens.unwrap_or(0),
        };

        Ok(LlmResponse {
            content: choice.message.content,
            usage,
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn summarize(&self, content: &str, max_tokens: usize) -> Result<Summary> {
        let prompt = format!(
            r#"You are a news article summarizer. Summarize the article below for a reader who asked for a short version.

INSTRUCTIONS:
1. Ignore markdown formatting, keep only the text content
2. Capture the key points of the whole article, not just its opening
3. Keep the original language of the article

OUTPUT FORMAT (strict JSON):
{{
  "headline": "one-line summary (max 100 chars)",
  "bullets": ["key point 1", "key point 2", "key point 3"]
}}

Use 2-5 bullet points.

ARTICLE:
{}
"#,
            content
        );

        let request = LlmRequest {
            prompt,
            max_tokens: Some(max_tokens),
            temperature: Some(0.3),
            timeout_seconds: None,
        };

        let response = self.generate(request).await?;

        let cleaned_json = super::extract_json_from_text(&response.content)
            .context("No valid JSON found in LLM summary response")?;

        let summary_data: SummaryJson = serde_json::from_str(&cleaned_json)
            .with_context(|| format!("Failed to parse LLM summary as JSON. Input was: {}", cleaned_json))?;

        Ok(Summary {
            headline: summary_data.headline,
            bullets: summary_data.bullets,
            usage: response.usage,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding_url = self.embeddings_url();
        let req_body = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let body = self
            .post_json(&embedding_url, &req_body, self.default_timeout, "Embedding")
            .await?;

        parse_embedding(&body)
    }
}

/// Accepts the OpenAI `data` envelope, a bare `{"embedding": [...]}` object
/// (Ollama) or a raw float array.
fn parse_embedding(body: &str) -> Result<Vec<f32>> {
    if let Ok(resp) = serde_json::from_str::<EmbeddingResponse>(body) {
        return resp
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .with_context(|| format!("Embedding response has no data: {}", body));
    }
    if let Ok(single) = serde_json::from_str::<SingleEmbedding>(body) {
        return Ok(single.embedding);
    }
    serde_json::from_str::<Vec<f32>>(body)
        .with_context(|| format!("Failed to parse embedding response (Body: {})", body))
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SummaryJson {
    headline: String,
    #[serde(default)]
    bullets: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct SingleEmbedding {
    embedding: Vec<f32>,
}
