use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionError, CompletionModel, CompletionParams, CompletionResult, Message, Usage};

/// Chat model behind an OpenAI-compatible `/chat/completions` endpoint
/// (Groq by default).
pub struct OpenAICompletionModel {
    base_url: String,
    model_name: String,
    api_key: String,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageResponse>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageResponse {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAICompletionModel {
    pub fn new(
        base_url: &str,
        model_name: &str,
        api_key: &str,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            http_client,
        }
    }

    fn parse_response(&self, response: ChatResponse) -> Result<CompletionResult, CompletionError> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CompletionError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResult { content, usage })
    }
}

#[async_trait]
impl CompletionModel for OpenAICompletionModel {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<CompletionResult, CompletionError> {
        let request = ChatRequest {
            model: &self.model_name,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
        };

        let resp = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, body });
        }

        let response: ChatResponse = resp.json().await?;
        let result = self.parse_response(response)?;
        if let Some(usage) = result.usage {
            debug!(
                "{} used {} tokens ({} prompt, {} completion)",
                self.model_name, usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
