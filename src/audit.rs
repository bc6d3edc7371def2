//! Append-only record of failover events

use std::path::PathBuf;
use std::sync::RwLock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use log::{debug, warn};
use tokio::io::AsyncWriteExt;

/// One failover event: the first candidate was abandoned and a later
/// one answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyLogEntry
{   /// First candidate in the ordered list
    pub original_provider_key: crate::ProviderKey
  , /// Candidate that finally succeeded
    pub fallback_provider_key: crate::ProviderKey
  , /// Last error text from the abandoned provider
    pub reason: String
  , pub timestamp: DateTime<Utc>
  , pub caller_id: Option<String>
  , pub request_id: String
}

/// Audit log sink. Entries come back from `query` in append order.
#[async_trait]
pub trait AuditSink: Send + Sync
{   async fn append(
      &self
    , entry: ContingencyLogEntry
    ) -> Result<(), crate::error::Error>;

    /// Entries with `timestamp >= since`
    async fn query(
      &self
    , since: DateTime<Utc>
    ) -> Result<Vec<ContingencyLogEntry>, crate::error::Error>;
}

// ===== In-Memory Log =====

#[derive(Debug, Default)]
pub struct InMemoryAuditLog
{   entries: RwLock<Vec<ContingencyLogEntry>>
}

impl InMemoryAuditLog
{   pub fn new() -> Self
    {   InMemoryAuditLog::default()
    }

    /// Every entry, regardless of age
    pub fn entries(&self) -> Vec<ContingencyLogEntry>
    {   self.entries
          .read()
          .map(|e| e.clone())
          .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize
    {   self.entries().len()
    }

    pub fn is_empty(&self) -> bool
    {   self.len() == 0
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog
{   async fn append(
      &self
    , entry: ContingencyLogEntry
    ) -> Result<(), crate::error::Error>
    {   let mut entries = self.entries.write().map_err(|_| {
          crate::error::Error::AuditLogWriteFailed(
            "audit log lock poisoned".to_string()
          )
        })?;
        entries.push(entry);
        Ok(())
    }

    async fn query(
      &self
    , since: DateTime<Utc>
    ) -> Result<Vec<ContingencyLogEntry>, crate::error::Error>
    {   Ok(self.entries()
          .into_iter()
          .filter(|e| e.timestamp >= since)
          .collect())
    }
}

// ===== JSON Lines File Log =====

/// One JSON document per line, appended; never rewritten
pub struct JsonLinesAuditLog
{   path: PathBuf
  , write_lock: tokio::sync::Mutex<()>
}

impl JsonLinesAuditLog
{   pub fn new(path: impl Into<PathBuf>) -> Self
    {   JsonLinesAuditLog
        {   path: path.into()
          , write_lock: tokio::sync::Mutex::new(())
        }
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditLog
{   async fn append(
      &self
    , entry: ContingencyLogEntry
    ) -> Result<(), crate::error::Error>
    {   let mut line = serde_json::to_string(&entry).map_err(|e| {
          crate::error::Error::AuditLogWriteFailed(e.to_string())
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
          .create(true)
          .append(true)
          .open(&self.path)
          .await
          .map_err(|e| {
            crate::error::Error::AuditLogWriteFailed(format!(
              "cannot open {}: {}",
              self.path.display(),
              e
            ))
          })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
          crate::error::Error::AuditLogWriteFailed(e.to_string())
        })?;
        file.flush().await.map_err(|e| {
          crate::error::Error::AuditLogWriteFailed(e.to_string())
        })?;
        debug!("Appended contingency entry {}", entry.request_id);
        Ok(())
    }

    async fn query(
      &self
    , since: DateTime<Utc>
    ) -> Result<Vec<ContingencyLogEntry>, crate::error::Error>
    {   let text = match tokio::fs::read_to_string(&self.path).await
        {   Ok(text) => text
          , Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
              return Ok(vec![]);
            }
          , Err(e) => {
              return Err(crate::error::Error::Other(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
              )));
            }
        };

        let mut entries = Vec::new();
        for (number, line) in text.lines().enumerate()
        {   if line.trim().is_empty()
            {   continue;
            }
            match serde_json::from_str::<ContingencyLogEntry>(line)
            {   Ok(entry) if entry.timestamp >= since => entries.push(entry)
              , Ok(_) => {}
              , Err(e) => {
                  warn!(
                    "Skipping malformed audit line {} in {}: {}",
                    number + 1,
                    self.path.display(),
                    e
                  );
                }
            }
        }
        Ok(entries)
    }
}
