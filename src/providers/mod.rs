//! Provider invocation boundary and vendor implementations

pub mod http;

// Re-export for convenience
pub use http::HttpInvoker;

use async_trait::async_trait;

/// What one successful provider call hands back
#[derive(Debug, Clone, PartialEq)]
pub struct Completion
{   pub content: String
  , pub tokens_used: usize
}

/// Exactly one attempt against exactly one provider.
///
/// The orchestrator depends only on this signature; every vendor
/// protocol lives behind it.
#[async_trait]
pub trait ProviderInvoker: Send + Sync
{   async fn invoke(
      &self
    , provider: &crate::config::Provider
    , request: &crate::request::GenerationRequest
    ) -> Result<Completion, crate::error::Error>;
}
