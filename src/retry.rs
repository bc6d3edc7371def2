//! Bounded retry against a single provider

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

/// Suspends between attempts. Injected so tests can skip real waits.
#[async_trait]
pub trait Sleeper: Send + Sync
{   async fn sleep(&self, duration: Duration);
}

/// Cooperative sleep on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper
{   async fn sleep(&self, duration: Duration)
    {   tokio::time::sleep(duration).await;
    }
}

/// Wraps a [`crate::ProviderInvoker`] with retry-with-delay for one
/// provider at a time
#[derive(Clone)]
pub struct RetryController
{   invoker: Arc<dyn crate::providers::ProviderInvoker>
  , sleeper: Arc<dyn Sleeper>
}

impl RetryController
{   pub fn new(
      invoker: Arc<dyn crate::providers::ProviderInvoker>
    , sleeper: Arc<dyn Sleeper>
    ) -> Self
    {   RetryController
        {   invoker
          , sleeper
        }
    }

    /// Try `provider` up to the policy's effective attempt count.
    ///
    /// Returns the first success, or the last failure wrapped in
    /// `ProviderAttemptFailed` once every attempt has failed.
    /// Cancellation wins over both the in-flight call and any
    /// pending delay.
    pub async fn attempt(
      &self
    , provider: &crate::config::Provider
    , request: &crate::request::GenerationRequest
    , policy: &crate::config::ContingencyPolicy
    , cancel: &CancellationToken
    ) -> Result<crate::request::GenerationResult, crate::error::Error>
    {   let max_attempts = policy.effective_max_attempts();
        let request_id = request.request_id.clone().unwrap_or_default();
        let mut last_error: Option<crate::error::Error> = None;

        for attempt in 1..=max_attempts
        {   if cancel.is_cancelled()
            {   return Err(crate::error::Error::Cancelled);
            }
            debug!(
              "[{}] Attempt {}/{} with {}",
              request_id, attempt, max_attempts, provider.display_name
            );

            let outcome = tokio::select!
            { biased;
              _ = cancel.cancelled() => {
                debug!("[{}] Cancelled during {} call", request_id, provider.key);
                return Err(crate::error::Error::Cancelled);
              }
            , outcome = self.invoker.invoke(provider, request) => outcome
            };

            match outcome
            {   Ok(completion) => {
                  return Ok(crate::request::GenerationResult
                  {   content: completion.content
                    , provider_key: provider.key
                    , model: provider.model.clone()
                    , tokens_used: completion.tokens_used
                    , request_id
                  });
                }
              , Err(e) => {
                  warn!(
                    "[{}] Attempt {} with {} failed: {}",
                    request_id, attempt, provider.display_name, e
                  );
                  last_error = Some(
                    crate::error::Error::ProviderAttemptFailed(format!(
                      "{}: {}", provider.display_name, e
                    ))
                  );
                }
            }

            if attempt < max_attempts
            {   tokio::select!
                { biased;
                  _ = cancel.cancelled() => {
                    debug!("[{}] Cancelled during retry delay", request_id);
                    return Err(crate::error::Error::Cancelled);
                  }
                , _ = self.sleeper.sleep(policy.retry_delay) => {}
                }
            }
        }

        debug!(
          "[{}] {} failed after {} attempts",
          request_id, provider.display_name, max_attempts
        );
        Err(last_error.unwrap_or_else(|| {
          crate::error::Error::ProviderAttemptFailed(format!(
            "{} made no attempt", provider.display_name
          ))
        }))
    }
}
