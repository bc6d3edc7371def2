//! Request and result types shared by every provider

use serde::{Deserialize, Serialize};

/// Temperature sent when the caller leaves it unset
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Token ceiling sent when the caller leaves it unset
pub const DEFAULT_MAX_TOKENS: usize = 1000;

/// Caller-supplied unit of work
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest
{   /// The prompt text
    pub prompt: String
  , /// Max tokens to generate
    pub max_tokens: Option<usize>
  , /// Temperature for sampling
    pub temperature: Option<f32>
  , /// Who asked; only used for audit attribution
    pub caller_id: Option<String>
  , /// Ties together every log line of one logical request
    pub request_id: Option<String>
}

impl GenerationRequest
{   pub fn new(prompt: impl Into<String>) -> Self
    {   GenerationRequest
        {   prompt: prompt.into()
          , ..Default::default()
        }
    }

    pub fn with_caller(mut self, caller_id: impl Into<String>) -> Self
    {   self.caller_id = Some(caller_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self
    {   self.request_id = Some(request_id.into());
        self
    }

    pub fn max_tokens_or_default(&self) -> usize
    {   self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn temperature_or_default(&self) -> f32
    {   self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Fill in a fresh request id when the caller did not supply one
    pub fn ensure_request_id(&mut self) -> String
    {   match &self.request_id
        {   Some(id) if !id.trim().is_empty() => id.clone()
          , _ => {
              let id = uuid::Uuid::new_v4().to_string();
              self.request_id = Some(id.clone());
              id
            }
        }
    }
}

/// Outcome of one successful attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult
{   /// Generated text
    pub content: String
  , /// Provider that generated it
    pub provider_key: crate::ProviderKey
  , /// Model that generated it
    pub model: String
  , /// Tokens used, reported or estimated
    pub tokens_used: usize
  , pub request_id: String
}
