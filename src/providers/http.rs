use serde::{Deserialize, Serialize};
use log::{debug, trace, error};
use async_trait::async_trait;
use crate::ProviderKey;

const OPENAI_API_BASE: &str
  = "https://api.openai.com/v1";
const ANTHROPIC_API_BASE: &str
  = "https://api.anthropic.com/v1";
const GEMINI_API_BASE: &str
  = "https://generativelanguage.googleapis.com/v1beta";
const OPENROUTER_API_BASE: &str
  = "https://openrouter.ai/api/v1";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENROUTER_TITLE: &str = "allm-contingency";

// ===== Message Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: String
}

/// Body shared by OpenAI and OpenRouter
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub max_tokens: usize
  , pub temperature: f32
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse
{   #[serde(default)]
    pub choices: Vec<Choice>
  , #[serde(default)]
    pub usage: Option<ChatUsage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: ChatMessage
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage
{   #[serde(default)]
    pub total_tokens: usize
}

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub max_tokens: usize
  , pub temperature: f32
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse
{   #[serde(default)]
    pub content: Vec<AnthropicBlock>
  , #[serde(default)]
    pub usage: Option<AnthropicUsage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicBlock
{   #[serde(default)]
    pub text: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicUsage
{   #[serde(default)]
    pub output_tokens: usize
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart
{   pub text: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent
{   #[serde(default)]
    pub parts: Vec<GeminiPart>
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig
{   pub temperature: f32
  , pub max_output_tokens: usize
  , pub top_p: f32
  , pub top_k: u32
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest
{   pub contents: Vec<GeminiContent>
  , pub generation_config: GeminiGenerationConfig
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse
{   #[serde(default)]
    pub candidates: Vec<GeminiCandidate>
  , #[serde(default)]
    pub usage_metadata: Option<GeminiUsage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate
{   pub content: Option<GeminiContent>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsage
{   #[serde(default)]
    pub total_token_count: usize
}

// ===== Endpoints =====

/// Base URLs per vendor; overridable for proxies and tests
#[derive(Debug, Clone)]
pub struct Endpoints
{   pub openai: String
  , pub anthropic: String
  , pub gemini: String
  , pub openrouter: String
}

impl Default for Endpoints
{   fn default() -> Self
    {   Endpoints
        {   openai: OPENAI_API_BASE.to_string()
          , anthropic: ANTHROPIC_API_BASE.to_string()
          , gemini: GEMINI_API_BASE.to_string()
          , openrouter: OPENROUTER_API_BASE.to_string()
        }
    }
}

impl Endpoints
{   /// Point every vendor at the same base URL
    pub fn all(base: &str) -> Self
    {   let base = base.trim_end_matches('/').to_string();
        Endpoints
        {   openai: base.clone()
          , anthropic: base.clone()
          , gemini: base.clone()
          , openrouter: base
        }
    }
}

// ===== HTTP Invoker =====

/// Talks to each vendor's public HTTP API
pub struct HttpInvoker
{   http_client: reqwest::Client
  , endpoints: Endpoints
}

impl HttpInvoker
{   pub fn new() -> Self
    {   HttpInvoker::with_endpoints(Endpoints::default())
    }

    pub fn with_endpoints(endpoints: Endpoints) -> Self
    {   debug!("Creating HttpInvoker");
        HttpInvoker
        {   http_client: reqwest::Client::new()
          , endpoints
        }
    }

    async fn post_json<B, R>(
      &self
    , key: ProviderKey
    , request: reqwest::RequestBuilder
    , body: &B
    ) -> Result<R, crate::error::Error>
    where
      B: Serialize + ?Sized
    , R: for<'de> Deserialize<'de>
    {   let response = request
          .header("Content-Type", "application/json")
          .json(body)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error from {}: {}", key, e);
            crate::error::Error::HttpError(
              format!("{}: {}", key, e.without_url())
            )
          })?;

        let status = response.status();
        trace!("{} response status: {}", key, status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("{} API error: {} - {}", key, status, error_text);
            return Err(crate::error::Error::ApiError(
              format!(
                "{} error: {} - {}",
                key.display_name(),
                status.as_u16(),
                error_text
              )
            ));
        }

        response.json().await.map_err(|e| {
          error!("Parse error from {}: {}", key, e);
          crate::error::Error::ParseError(e.to_string())
        })
    }

    async fn chat_completion(
      &self
    , provider: &crate::config::Provider
    , request: &crate::request::GenerationRequest
    , base: &str
    ) -> Result<super::Completion, crate::error::Error>
    {   let body = ChatCompletionRequest
        {   model: provider.model.clone()
          , messages: vec![user_message(&request.prompt)]
          , max_tokens: request.max_tokens_or_default()
          , temperature: request.temperature_or_default()
        };

        let mut builder = self.http_client
          .post(format!("{}/chat/completions", base))
          .header(
            "Authorization",
            format!("Bearer {}", provider.credential)
          );
        if provider.key == ProviderKey::OpenRouter
        {   builder = builder.header("X-Title", OPENROUTER_TITLE);
        }

        let response: ChatCompletionResponse
          = self.post_json(provider.key, builder, &body).await?;

        let content = response.choices
          .into_iter()
          .next()
          .map(|c| c.message.content)
          .ok_or_else(|| {
            error!("No choices in {} response", provider.key);
            crate::error::Error::NoChoicesInResponse
          })?;

        Ok(super::Completion
        {   content
          , tokens_used: response.usage
              .map(|u| u.total_tokens)
              .unwrap_or(0)
        })
    }

    async fn anthropic_messages(
      &self
    , provider: &crate::config::Provider
    , request: &crate::request::GenerationRequest
    ) -> Result<super::Completion, crate::error::Error>
    {   let body = AnthropicRequest
        {   model: provider.model.clone()
          , messages: vec![user_message(&request.prompt)]
          , max_tokens: request.max_tokens_or_default()
          , temperature: request.temperature_or_default()
        };

        let builder = self.http_client
          .post(format!("{}/messages", self.endpoints.anthropic))
          .header("x-api-key", provider.credential.as_str())
          .header("anthropic-version", ANTHROPIC_VERSION);

        let response: AnthropicResponse
          = self.post_json(provider.key, builder, &body).await?;

        let content = response.content
          .into_iter()
          .find_map(|block| block.text)
          .ok_or_else(|| {
            error!("No text block in Anthropic response");
            crate::error::Error::NoChoicesInResponse
          })?;

        Ok(super::Completion
        {   content
          , tokens_used: response.usage
              .map(|u| u.output_tokens)
              .unwrap_or(0)
        })
    }

    async fn gemini_generate(
      &self
    , provider: &crate::config::Provider
    , request: &crate::request::GenerationRequest
    ) -> Result<super::Completion, crate::error::Error>
    {   let body = GeminiRequest
        {   contents: vec![
              GeminiContent
              {   parts: vec![
                    GeminiPart
                    {   text: request.prompt.clone()
                    }
                  ]
              }
            ]
          , generation_config: GeminiGenerationConfig
            {   temperature: request.temperature_or_default()
              , max_output_tokens: request.max_tokens_or_default()
              , top_p: 0.8
              , top_k: 10
            }
        };

        // key goes in a header so it never shows up in error URLs
        let builder = self.http_client
          .post(format!(
            "{}/models/{}:generateContent",
            self.endpoints.gemini,
            provider.model
          ))
          .header("x-goog-api-key", provider.credential.as_str());

        let response: GeminiResponse
          = self.post_json(provider.key, builder, &body).await?;

        let content = response.candidates
          .into_iter()
          .next()
          .and_then(|c| c.content)
          .and_then(|c| c.parts.into_iter().next())
          .map(|p| p.text)
          .ok_or_else(|| {
            error!("Invalid Gemini response");
            crate::error::Error::NoChoicesInResponse
          })?;

        Ok(super::Completion
        {   content
          , tokens_used: response.usage_metadata
              .map(|u| u.total_token_count)
              .unwrap_or(0)
        })
    }
}

impl Default for HttpInvoker
{   fn default() -> Self
    {   HttpInvoker::new()
    }
}

fn user_message(prompt: &str) -> ChatMessage
{   ChatMessage
    {   role: "user".to_string()
      , content: prompt.to_string()
    }
}

#[async_trait]
impl super::ProviderInvoker for HttpInvoker
{   async fn invoke(
      &self
    , provider: &crate::config::Provider
    , request: &crate::request::GenerationRequest
    ) -> Result<super::Completion, crate::error::Error>
    {   debug!(
          "Invoking {} with model {}",
          provider.display_name, provider.model
        );

        if provider.credential.trim().is_empty()
        {   return Err(crate::error::Error::MissingApiKey(
              provider.key.to_string()
            ));
        }

        match provider.key
        {   ProviderKey::OpenAI => {
              self.chat_completion(
                provider, request, &self.endpoints.openai
              ).await
            }
          , ProviderKey::OpenRouter => {
              self.chat_completion(
                provider, request, &self.endpoints.openrouter
              ).await
            }
          , ProviderKey::Anthropic => {
              self.anthropic_messages(provider, request).await
            }
          , ProviderKey::Gemini => {
              self.gemini_generate(provider, request).await
            }
          , ProviderKey::Kilocode => {
              error!("Kilocode has no public API yet");
              Err(crate::error::Error::ProviderNotImplemented(
                provider.key.to_string()
              ))
            }
        }
    }
}
