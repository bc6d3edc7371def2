//! Provider catalog and contingency policy, plus the raw settings
//! record they are built from

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use log::{debug, warn};
use crate::ProviderKey;

/// One interchangeable AI backend
#[derive(Clone, PartialEq)]
pub struct Provider
{   pub key: ProviderKey
  , pub display_name: String
  , pub active: bool
  , /// Opaque secret, never logged
    pub credential: String
  , pub model: String
}

impl Provider
{   /// Provider with default label and model, inactive
    pub fn inactive(key: ProviderKey) -> Self
    {   Provider
        {   key
          , display_name: key.display_name().to_string()
          , active: false
          , credential: String::new()
          , model: key.default_model().to_string()
        }
    }

    /// Active and holding a credential
    pub fn is_eligible(&self) -> bool
    {   self.active && !self.credential.trim().is_empty()
    }
}

impl fmt::Debug for Provider
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   let credential = if self.credential.is_empty()
        {   "<empty>"
        } else
        {   "<redacted>"
        };
        f.debug_struct("Provider")
          .field("key", &self.key)
          .field("display_name", &self.display_name)
          .field("active", &self.active)
          .field("credential", &credential)
          .field("model", &self.model)
          .finish()
    }
}

/// Known providers and their current configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderCatalog
{   providers: Vec<Provider>
}

impl ProviderCatalog
{   /// Build a catalog; a later entry for the same key replaces
    /// the earlier one
    pub fn new(providers: Vec<Provider>) -> Self
    {   let mut catalog = ProviderCatalog::default();
        for provider in providers
        {   catalog.insert(provider);
        }
        catalog
    }

    fn insert(&mut self, provider: Provider)
    {   match self.providers.iter_mut().find(|p| p.key == provider.key)
        {   Some(existing) => *existing = provider
          , None => self.providers.push(provider)
        }
    }

    pub fn get(&self, key: ProviderKey) -> Option<&Provider>
    {   self.providers.iter().find(|p| p.key == key)
    }

    pub fn providers(&self) -> &[Provider]
    {   &self.providers
    }

    pub fn len(&self) -> usize
    {   self.providers.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.providers.is_empty()
    }
}

/// Global failover and retry switches
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyPolicy
{   /// Substitute other providers automatically
    pub failover_enabled: bool
  , /// Lower value is tried earlier; absent keys sort last
    pub priority_by_provider_key: HashMap<ProviderKey, i64>
  , /// Retry the same provider before moving on
    pub retry_enabled: bool
  , /// Attempts per provider when retry is enabled
    pub max_attempts_per_provider: u32
  , /// Wait between attempts on the same provider
    pub retry_delay: Duration
}

impl ContingencyPolicy
{   /// Attempts each provider actually gets
    pub fn effective_max_attempts(&self) -> u32
    {   if self.retry_enabled
        {   self.max_attempts_per_provider.max(1)
        } else
        {   1
        }
    }

    /// Priority weight for a key, worst when unset
    pub fn priority_of(&self, key: ProviderKey) -> i64
    {   self.priority_by_provider_key
          .get(&key)
          .copied()
          .unwrap_or(i64::MAX)
    }
}

impl Default for ContingencyPolicy
{   fn default() -> Self
    {   let mut priority_by_provider_key = HashMap::new();
        priority_by_provider_key.insert(ProviderKey::Gemini, 1);
        ContingencyPolicy
        {   failover_enabled: false
          , priority_by_provider_key
          , retry_enabled: true
          , max_attempts_per_provider: DEFAULT_MAX_RETRY_ATTEMPTS
          , retry_delay: Duration::from_secs(
              DEFAULT_RETRY_DELAY_SECONDS
            )
        }
    }
}

const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;

// ===== Settings Record =====

/// Per-provider row as held by the settings store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRecord
{   #[serde(default)]
    pub active: bool
  , #[serde(default)]
    pub api_key: Option<String>
  , #[serde(default)]
    pub model: Option<String>
}

/// The single settings document read from the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsRecord
{   #[serde(default)]
    pub contingency_enabled: bool
  , #[serde(default)]
    pub fallback_priority: HashMap<String, i64>
  , #[serde(default = "default_true")]
    pub auto_retry_enabled: bool
  , #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: i64
  , #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64
  , #[serde(default)]
    pub providers: HashMap<String, ProviderRecord>
}

fn default_true() -> bool
{   true
}

fn default_max_retry_attempts() -> i64
{   DEFAULT_MAX_RETRY_ATTEMPTS as i64
}

fn default_retry_delay_seconds() -> f64
{   DEFAULT_RETRY_DELAY_SECONDS as f64
}

impl Default for SettingsRecord
{   fn default() -> Self
    {   SettingsRecord
        {   contingency_enabled: false
          , fallback_priority: HashMap::new()
          , auto_retry_enabled: true
          , max_retry_attempts: default_max_retry_attempts()
          , retry_delay_seconds: default_retry_delay_seconds()
          , providers: HashMap::new()
        }
    }
}

/// Catalog and policy used when the store holds no settings:
/// failover off, every provider inactive.
pub fn default_settings() -> (ProviderCatalog, ContingencyPolicy)
{   let catalog = ProviderCatalog::new(
      ProviderKey::ALL.iter().copied().map(Provider::inactive).collect()
    );
    (catalog, ContingencyPolicy::default())
}

impl SettingsRecord
{   /// Validate and convert into the typed catalog and policy
    pub fn into_settings(
      self
    ) -> Result<(ProviderCatalog, ContingencyPolicy), crate::error::Error>
    {   if self.max_retry_attempts < 1
            || self.max_retry_attempts > u32::MAX as i64
        {   return Err(crate::error::Error::ConfigUnavailable(
              format!(
                "max_retry_attempts must be positive, got {}",
                self.max_retry_attempts
              )
            ));
        }
        let retry_delay = Duration::try_from_secs_f64(
          self.retry_delay_seconds
        ).map_err(|e| {
          crate::error::Error::ConfigUnavailable(format!(
            "retry_delay_seconds {} is not a valid delay: {}",
            self.retry_delay_seconds,
            e
          ))
        })?;

        let mut priority_by_provider_key = HashMap::new();
        for (key, priority) in self.fallback_priority
        {   match ProviderKey::parse(&key)
            {   Some(k) => {
                  priority_by_provider_key.insert(k, priority);
                }
              , None => {
                  warn!("Ignoring priority for unknown provider: {}", key);
                }
            }
        }

        let mut records: HashMap<ProviderKey, ProviderRecord>
          = HashMap::new();
        for (key, record) in self.providers
        {   match ProviderKey::parse(&key)
            {   Some(k) => {
                  records.insert(k, record);
                }
              , None => {
                  warn!("Ignoring settings for unknown provider: {}", key);
                }
            }
        }

        let mut providers = Vec::with_capacity(ProviderKey::ALL.len());
        for key in ProviderKey::ALL
        {   let record = records.remove(&key).unwrap_or_default();
            let credential = record.api_key
              .map(|k| k.trim().to_string())
              .unwrap_or_default();
            if record.active && credential.is_empty()
            {   return Err(crate::error::Error::ConfigUnavailable(
                  format!("{} is active but has no credential", key)
                ));
            }
            let model = record.model
              .filter(|m| !m.trim().is_empty())
              .unwrap_or_else(|| key.default_model().to_string());
            providers.push(Provider
            {   key
              , display_name: key.display_name().to_string()
              , active: record.active
              , credential
              , model
            });
        }

        let policy = ContingencyPolicy
        {   failover_enabled: self.contingency_enabled
          , priority_by_provider_key
          , retry_enabled: self.auto_retry_enabled
          , max_attempts_per_provider: self.max_retry_attempts as u32
          , retry_delay
        };
        debug!(
          "Settings converted: failover={} retry={} attempts={}",
          policy.failover_enabled,
          policy.retry_enabled,
          policy.max_attempts_per_provider
        );
        Ok((ProviderCatalog::new(providers), policy))
    }
}
