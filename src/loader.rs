//! Cached configuration snapshot, swapped whole on reload

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, trace};
use crate::config::{ContingencyPolicy, ProviderCatalog, SettingsRecord};

/// Where the settings document comes from.
///
/// `Ok(None)` means the store answered but holds no settings yet;
/// the loader then falls back to built-in defaults.
#[async_trait]
pub trait ConfigSource: Send + Sync
{   async fn fetch(&self)
      -> Result<Option<SettingsRecord>, crate::error::Error>;
}

/// Catalog and policy as read together from one fetch
#[derive(Debug, Clone)]
pub struct ConfigSnapshot
{   pub catalog: ProviderCatalog
  , pub policy: ContingencyPolicy
  , pub loaded_at: DateTime<Utc>
}

/// Owns the process-wide snapshot. Readers get an `Arc` to either
/// the previous or the new snapshot, never a mix of both.
pub struct PolicyLoader
{   source: Arc<dyn ConfigSource>
  , cached: ArcSwapOption<ConfigSnapshot>
}

impl PolicyLoader
{   pub fn new(source: Arc<dyn ConfigSource>) -> Self
    {   debug!("Creating PolicyLoader");
        PolicyLoader
        {   source
          , cached: ArcSwapOption::empty()
        }
    }

    /// Current snapshot, fetched on first use
    pub async fn load(&self)
      -> Result<Arc<ConfigSnapshot>, crate::error::Error>
    {   if let Some(snapshot) = self.cached.load_full()
        {   trace!("Using cached configuration snapshot");
            return Ok(snapshot);
        }
        debug!("No cached configuration, fetching");
        self.reload().await
    }

    /// Force a fresh fetch and swap it in. On failure the previous
    /// snapshot stays in place.
    pub async fn reload(&self)
      -> Result<Arc<ConfigSnapshot>, crate::error::Error>
    {   let fetched = self.source.fetch().await.map_err(|e| {
          error!("Failed to fetch settings: {}", e);
          if matches!(e, crate::error::Error::ConfigUnavailable(_))
          {   e
          } else
          {   crate::error::Error::ConfigUnavailable(e.to_string())
          }
        })?;

        let (catalog, policy) = match fetched
        {   Some(record) => record.into_settings().map_err(|e| {
              error!("Rejected settings: {}", e);
              e
            })?
          , None => {
              info!("No settings stored, using defaults");
              crate::config::default_settings()
            }
        };

        let snapshot = Arc::new(ConfigSnapshot
        {   catalog
          , policy
          , loaded_at: Utc::now()
        });
        self.cached.store(Some(Arc::clone(&snapshot)));
        info!(
          "Configuration loaded: {} providers, failover {}",
          snapshot.catalog.len(),
          if snapshot.policy.failover_enabled { "on" } else { "off" }
        );
        Ok(snapshot)
    }

    /// Snapshot if one has been loaded, without fetching
    pub fn cached(&self) -> Option<Arc<ConfigSnapshot>>
    {   self.cached.load_full()
    }
}

// ===== Sources =====

/// In-memory source; the record can be replaced between reloads
#[derive(Default)]
pub struct StaticSource
{   state: Mutex<StaticState>
}

#[derive(Default)]
struct StaticState
{   record: Option<SettingsRecord>
  , failure: Option<String>
  , fetches: usize
}

impl StaticSource
{   pub fn new(record: Option<SettingsRecord>) -> Self
    {   StaticSource
        {   state: Mutex::new(StaticState
            {   record
              , failure: None
              , fetches: 0
            })
        }
    }

    /// Replace the stored record and clear any injected failure
    pub fn set(&self, record: Option<SettingsRecord>)
    {   let mut state = self.lock();
        state.record = record;
        state.failure = None;
    }

    /// Make subsequent fetches fail as if the store were down
    pub fn fail_with(&self, message: &str)
    {   self.lock().failure = Some(message.to_string());
    }

    /// How many times the store was queried
    pub fn fetch_count(&self) -> usize
    {   self.lock().fetches
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticState>
    {   self.state
          .lock()
          .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConfigSource for StaticSource
{   async fn fetch(&self)
      -> Result<Option<SettingsRecord>, crate::error::Error>
    {   let mut state = self.lock();
        state.fetches += 1;
        if let Some(message) = &state.failure
        {   return Err(crate::error::Error::ConfigUnavailable(
              message.clone()
            ));
        }
        Ok(state.record.clone())
    }
}

/// Reads the settings document from a JSON file. An empty file or
/// a literal `null` counts as "no settings stored".
pub struct JsonFileSource
{   path: PathBuf
}

impl JsonFileSource
{   pub fn new(path: impl Into<PathBuf>) -> Self
    {   JsonFileSource
        {   path: path.into()
        }
    }
}

#[async_trait]
impl ConfigSource for JsonFileSource
{   async fn fetch(&self)
      -> Result<Option<SettingsRecord>, crate::error::Error>
    {   debug!("Reading settings from {}", self.path.display());
        let text = tokio::fs::read_to_string(&self.path)
          .await
          .map_err(|e| {
            crate::error::Error::ConfigUnavailable(format!(
              "cannot read {}: {}",
              self.path.display(),
              e
            ))
          })?;

        if text.trim().is_empty()
        {   return Ok(None);
        }

        serde_json::from_str::<Option<SettingsRecord>>(&text)
          .map_err(|e| {
            crate::error::Error::ConfigUnavailable(format!(
              "malformed settings in {}: {}",
              self.path.display(),
              e
            ))
          })
    }
}
