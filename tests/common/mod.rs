#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use allm_contingency::audit::{AuditSink, ContingencyLogEntry, InMemoryAuditLog};
use allm_contingency::config::{Provider, ProviderRecord, SettingsRecord};
use allm_contingency::loader::{ConfigSource, PolicyLoader, StaticSource};
use allm_contingency::request::GenerationRequest;
use allm_contingency::retry::{RetryController, Sleeper};
use allm_contingency::{
  Completion, Error, FailoverOrchestrator, ProviderInvoker, ProviderKey
};

pub fn init_logging()
{   let _ = env_logger::builder().is_test(true).try_init();
}

/// What a scripted provider call does
#[derive(Debug, Clone)]
pub enum Outcome
{   Reply(String)
  , Fail(String)
  , Hang
}

/// Invoker that follows a per-provider script and counts calls.
/// Once a script runs out, its last step repeats.
#[derive(Default)]
pub struct MockInvoker
{   scripts: Mutex<HashMap<ProviderKey, Vec<Outcome>>>
  , calls: Mutex<Vec<ProviderKey>>
}

impl MockInvoker
{   pub fn new() -> Self
    {   MockInvoker::default()
    }

    pub fn script(self, key: ProviderKey, steps: Vec<Outcome>) -> Self
    {   self.scripts.lock().unwrap().insert(key, steps);
        self
    }

    pub fn succeed(self, key: ProviderKey, content: &str) -> Self
    {   self.script(key, vec![Outcome::Reply(content.to_string())])
    }

    pub fn fail(self, key: ProviderKey, message: &str) -> Self
    {   self.script(key, vec![Outcome::Fail(message.to_string())])
    }

    pub fn hang(self, key: ProviderKey) -> Self
    {   self.script(key, vec![Outcome::Hang])
    }

    pub fn calls(&self, key: ProviderKey) -> usize
    {   self.calls.lock().unwrap().iter().filter(|k| **k == key).count()
    }

    pub fn total_calls(&self) -> usize
    {   self.calls.lock().unwrap().len()
    }

    pub fn call_order(&self) -> Vec<ProviderKey>
    {   self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderInvoker for MockInvoker
{   async fn invoke(
      &self
    , provider: &Provider
    , _request: &GenerationRequest
    ) -> Result<Completion, Error>
    {   let step = {
          let mut calls = self.calls.lock().unwrap();
          let index = calls.iter().filter(|k| **k == provider.key).count();
          calls.push(provider.key);
          let scripts = self.scripts.lock().unwrap();
          match scripts.get(&provider.key)
          {   Some(steps) if !steps.is_empty() => {
                steps[index.min(steps.len() - 1)].clone()
              }
            , _ => Outcome::Fail(format!("{} unscripted", provider.key))
          }
        };

        match step
        {   Outcome::Reply(content) => Ok(Completion
            {   tokens_used: content.len()
              , content
            })
          , Outcome::Fail(message) => Err(Error::ApiError(message))
          , Outcome::Hang => {
              std::future::pending::<()>().await;
              unreachable!()
            }
        }
    }
}

/// Records requested delays and returns at once
#[derive(Default)]
pub struct InstantSleeper
{   slept: Mutex<Vec<Duration>>
}

impl InstantSleeper
{   pub fn delays(&self) -> Vec<Duration>
    {   self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper
{   async fn sleep(&self, duration: Duration)
    {   self.slept.lock().unwrap().push(duration);
    }
}

/// Sleeper that never wakes up
pub struct StuckSleeper;

#[async_trait]
impl Sleeper for StuckSleeper
{   async fn sleep(&self, _duration: Duration)
    {   std::future::pending::<()>().await;
    }
}

/// Settings store that never answers
pub struct HangingSource;

#[async_trait]
impl ConfigSource for HangingSource
{   async fn fetch(&self) -> Result<Option<SettingsRecord>, Error>
    {   std::future::pending::<()>().await;
        Ok(None)
    }
}

/// Sink whose writes always fail
pub struct BrokenAuditLog;

#[async_trait]
impl AuditSink for BrokenAuditLog
{   async fn append(&self, _entry: ContingencyLogEntry) -> Result<(), Error>
    {   Err(Error::AuditLogWriteFailed("disk full".to_string()))
    }

    async fn query(&self, _since: DateTime<Utc>)
      -> Result<Vec<ContingencyLogEntry>, Error>
    {   Err(Error::Other("unreachable store".to_string()))
    }
}

/// Settings with the given providers active and credentialed,
/// each paired with its priority
pub fn settings(
  failover: bool
, retry: bool
, attempts: i64
, active: &[(ProviderKey, Option<i64>)]
) -> SettingsRecord
{   let mut record = SettingsRecord::default();
    record.contingency_enabled = failover;
    record.auto_retry_enabled = retry;
    record.max_retry_attempts = attempts;
    record.retry_delay_seconds = 2.0;
    for (key, priority) in active
    {   record.providers.insert(
          key.as_str().to_string(),
          ProviderRecord
          {   active: true
            , api_key: Some(format!("sk-{}", key))
            , model: None
          }
        );
        if let Some(p) = priority
        {   record.fallback_priority.insert(key.as_str().to_string(), *p);
        }
    }
    record
}

pub struct Harness
{   pub orchestrator: Arc<FailoverOrchestrator>
  , pub invoker: Arc<MockInvoker>
  , pub sleeper: Arc<InstantSleeper>
  , pub audit: Arc<InMemoryAuditLog>
  , pub source: Arc<StaticSource>
}

pub fn harness(record: Option<SettingsRecord>, invoker: MockInvoker) -> Harness
{   init_logging();
    let invoker = Arc::new(invoker);
    let sleeper = Arc::new(InstantSleeper::default());
    let audit = Arc::new(InMemoryAuditLog::new());
    let source = Arc::new(StaticSource::new(record));
    let loader = Arc::new(PolicyLoader::new(source.clone()));
    let retry = RetryController::new(invoker.clone(), sleeper.clone());
    let orchestrator = Arc::new(FailoverOrchestrator::new(
      loader,
      retry,
      audit.clone()
    ));
    Harness
    {   orchestrator
      , invoker
      , sleeper
      , audit
      , source
    }
}

pub fn entry(
  original: ProviderKey
, fallback: ProviderKey
, timestamp: DateTime<Utc>
) -> ContingencyLogEntry
{   ContingencyLogEntry
    {   original_provider_key: original
      , fallback_provider_key: fallback
      , reason: format!("{} down", original)
      , timestamp
      , caller_id: Some("user-1".to_string())
      , request_id: uuid_like(timestamp)
    }
}

fn uuid_like(timestamp: DateTime<Utc>) -> String
{   format!("req-{}", timestamp.timestamp_nanos_opt().unwrap_or_default())
}
