//! Failover across providers in priority order

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use crate::audit::{AuditSink, ContingencyLogEntry};
use crate::config::Provider;
use crate::loader::PolicyLoader;
use crate::request::{GenerationRequest, GenerationResult};
use crate::retry::RetryController;

/// Result of a provider connectivity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCheck
{   pub success: bool
  , pub message: String
}

/// Drives the ordered candidate list until one provider answers.
///
/// Holds no per-request state; one instance serves any number of
/// concurrent `execute` calls.
pub struct FailoverOrchestrator
{   loader: Arc<PolicyLoader>
  , retry: RetryController
  , audit: Arc<dyn AuditSink>
}

impl FailoverOrchestrator
{   pub fn new(
      loader: Arc<PolicyLoader>
    , retry: RetryController
    , audit: Arc<dyn AuditSink>
    ) -> Self
    {   debug!("Creating FailoverOrchestrator");
        FailoverOrchestrator
        {   loader
          , retry
          , audit
        }
    }

    pub fn loader(&self) -> &Arc<PolicyLoader>
    {   &self.loader
    }

    /// Generate with automatic contingency
    pub async fn execute(
      &self
    , request: GenerationRequest
    , preferred: Option<&str>
    ) -> Result<GenerationResult, crate::error::Error>
    {   self.execute_with_cancel(
          request
        , preferred
        , &CancellationToken::new()
        ).await
    }

    /// Like [`execute`](Self::execute), abandoned once `deadline`
    /// has elapsed
    pub async fn execute_with_deadline(
      &self
    , request: GenerationRequest
    , preferred: Option<&str>
    , deadline: Duration
    ) -> Result<GenerationResult, crate::error::Error>
    {   let cancel = CancellationToken::new();
        let timer = {
          let cancel = cancel.clone();
          tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            cancel.cancel();
          })
        };
        let result = self
          .execute_with_cancel(request, preferred, &cancel)
          .await;
        timer.abort();
        result
    }

    /// Like [`execute`](Self::execute), abandoned as soon as
    /// `cancel` fires
    pub async fn execute_with_cancel(
      &self
    , mut request: GenerationRequest
    , preferred: Option<&str>
    , cancel: &CancellationToken
    ) -> Result<GenerationResult, crate::error::Error>
    {   let request_id = request.ensure_request_id();
        debug!(
          "[{}] Execute requested, preferred provider: {:?}",
          request_id, preferred
        );

        let snapshot = tokio::select!
        { biased;
          _ = cancel.cancelled() => {
            info!("[{}] Cancelled while loading configuration", request_id);
            return Err(crate::error::Error::Cancelled);
          }
        , loaded = self.loader.load() => loaded?
        };
        let preferred_key = preferred.and_then(|key| {
          let parsed = crate::ProviderKey::parse(key);
          if parsed.is_none()
          {   debug!("[{}] Unknown preferred provider: {}", request_id, key);
          }
          parsed
        });

        if !snapshot.policy.failover_enabled
        {   return self.execute_single(
              &request
            , &snapshot
            , preferred_key
            , cancel
            ).await;
        }

        let candidates = crate::ordering::order(
          &snapshot.catalog
        , &snapshot.policy
        , preferred_key
        );
        if candidates.is_empty()
        {   warn!("[{}] No active AI provider", request_id);
            return Err(crate::error::Error::NoEligibleProvider);
        }

        let mut last_error = String::new();
        for (index, provider) in candidates.iter().enumerate()
        {   match self.retry
              .attempt(provider, &request, &snapshot.policy, cancel)
              .await
            {   Ok(result) => {
                  if index > 0
                  {   self.record_contingency(
                        &candidates[0]
                      , provider
                      , last_error
                      , &request
                      ).await;
                  }
                  info!(
                    "[{}] Served by {} ({} of {})",
                    request_id,
                    provider.key,
                    index + 1,
                    candidates.len()
                  );
                  return Ok(result);
                }
              , Err(crate::error::Error::Cancelled) => {
                  info!("[{}] Cancelled by caller", request_id);
                  return Err(crate::error::Error::Cancelled);
                }
              , Err(e) => {
                  last_error = e.to_string();
                  if index + 1 < candidates.len()
                  {   warn!(
                        "[{}] {} exhausted, trying next provider",
                        request_id, provider.display_name
                      );
                  }
                }
            }
        }

        error!(
          "[{}] All providers failed. Last error: {}",
          request_id, last_error
        );
        Err(crate::error::Error::AllProvidersExhausted(last_error))
    }

    /// Failover disabled: the preferred provider or nothing
    async fn execute_single(
      &self
    , request: &GenerationRequest
    , snapshot: &crate::loader::ConfigSnapshot
    , preferred: Option<crate::ProviderKey>
    , cancel: &CancellationToken
    ) -> Result<GenerationResult, crate::error::Error>
    {   let provider = preferred
          .and_then(|key| snapshot.catalog.get(key))
          .filter(|p| p.is_eligible())
          .ok_or_else(|| {
            warn!("Preferred provider is not available and failover is off");
            crate::error::Error::NoEligibleProvider
          })?;

        match self.retry
          .attempt(provider, request, &snapshot.policy, cancel)
          .await
        {   Ok(result) => Ok(result)
          , Err(crate::error::Error::Cancelled) => {
              Err(crate::error::Error::Cancelled)
            }
          , Err(e) => {
              error!("{} failed with failover off: {}", provider.key, e);
              Err(crate::error::Error::AllProvidersExhausted(
                e.to_string()
              ))
            }
        }
    }

    /// Best effort; a failed write is only logged
    async fn record_contingency(
      &self
    , original: &Provider
    , fallback: &Provider
    , reason: String
    , request: &GenerationRequest
    )
    {   let entry = ContingencyLogEntry
        {   original_provider_key: original.key
          , fallback_provider_key: fallback.key
          , reason
          , timestamp: Utc::now()
          , caller_id: request.caller_id.clone()
          , request_id: request.request_id.clone().unwrap_or_default()
        };
        info!(
          "[{}] Contingency: {} -> {}",
          entry.request_id, original.key, fallback.key
        );
        if let Err(e) = self.audit.append(entry).await
        {   let diagnostic = if matches!(
              e, crate::error::Error::AuditLogWriteFailed(_)
            )
            {   e
            } else
            {   crate::error::Error::AuditLogWriteFailed(e.to_string())
            };
            error!("{}", diagnostic);
        }
    }

    /// Force a fresh configuration fetch
    pub async fn reload_configuration(&self)
      -> Result<(), crate::error::Error>
    {   info!("Reloading contingency configuration");
        self.loader.reload().await.map(|_| ())
    }

    /// One unretried call to `provider_key` with a short prompt
    pub async fn test_provider(&self, provider_key: &str) -> ProviderCheck
    {   let snapshot = match self.loader.load().await
        {   Ok(snapshot) => snapshot
          , Err(e) => return ProviderCheck
            {   success: false
              , message: e.to_string()
            }
        };

        let provider = match crate::ProviderKey::parse(provider_key)
          .and_then(|key| snapshot.catalog.get(key))
        {   Some(provider) => provider
          , None => return ProviderCheck
            {   success: false
              , message: "Provider not found".to_string()
            }
        };
        if !provider.active
        {   return ProviderCheck
            {   success: false
              , message: "Provider is not active".to_string()
            };
        }
        if provider.credential.trim().is_empty()
        {   return ProviderCheck
            {   success: false
              , message: "API key not configured".to_string()
            };
        }

        let mut request = GenerationRequest::new("Connectivity test");
        request.max_tokens = Some(10);
        request.temperature = Some(0.1);
        request.ensure_request_id();

        let mut policy = snapshot.policy.clone();
        policy.retry_enabled = false;

        match self.retry
          .attempt(provider, &request, &policy, &CancellationToken::new())
          .await
        {   Ok(_) => ProviderCheck
            {   success: true
              , message: "Provider is working".to_string()
            }
          , Err(e) => ProviderCheck
            {   success: false
              , message: format!("Error: {}", e)
            }
        }
    }
}
