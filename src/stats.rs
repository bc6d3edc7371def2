//! Aggregation over the audit log for a trailing window

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use log::{debug, error};

/// Failover activity over the last `window_days`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary
{   pub window_days: u32
  , pub total_events: usize
  , /// How often each provider was abandoned as first candidate
    pub per_original_provider_failure_count
      : BTreeMap<crate::ProviderKey, usize>
  , /// Empty when the window holds no events
    pub most_used_fallback_provider_key: String
}

/// Count events per abandoned provider and find the most used
/// fallback; ties go to whichever fallback appeared first.
pub fn aggregate(entries: &[crate::audit::ContingencyLogEntry]) -> StatsSummary
{   let mut per_original = BTreeMap::new();
    let mut fallback_usage: Vec<(crate::ProviderKey, usize)> = Vec::new();

    for entry in entries
    {   *per_original.entry(entry.original_provider_key).or_insert(0) += 1;
        match fallback_usage
          .iter_mut()
          .find(|(key, _)| *key == entry.fallback_provider_key)
        {   Some((_, count)) => *count += 1
          , None => fallback_usage.push((entry.fallback_provider_key, 1))
        }
    }

    let mut most_used: Option<(crate::ProviderKey, usize)> = None;
    for (key, count) in fallback_usage
    {   match most_used
        {   Some((_, best)) if count <= best => {}
          , _ => most_used = Some((key, count))
        }
    }

    StatsSummary
    {   window_days: 0
      , total_events: entries.len()
      , per_original_provider_failure_count: per_original
      , most_used_fallback_provider_key: most_used
          .map(|(key, _)| key.to_string())
          .unwrap_or_default()
    }
}

/// Read side of the contingency log
pub struct ContingencyStats
{   audit: Arc<dyn crate::audit::AuditSink>
}

impl ContingencyStats
{   pub fn new(audit: Arc<dyn crate::audit::AuditSink>) -> Self
    {   ContingencyStats
        {   audit
        }
    }

    /// Summary for the `window_days` leading up to now
    pub async fn summarize(&self, window_days: u32) -> StatsSummary
    {   self.summarize_at(window_days, Utc::now()).await
    }

    /// Summary for the `window_days` leading up to `now`. A failed
    /// query yields an empty summary.
    pub async fn summarize_at(
      &self
    , window_days: u32
    , now: DateTime<Utc>
    ) -> StatsSummary
    {   let since = now
          .checked_sub_signed(Duration::days(window_days as i64))
          .unwrap_or(DateTime::<Utc>::MIN_UTC);
        debug!("Summarizing contingency events since {}", since);

        let entries = match self.audit.query(since).await
        {   Ok(entries) => entries
          , Err(e) => {
              error!("Failed to query contingency log: {}", e);
              Vec::new()
            }
        };

        let mut summary = aggregate(&entries);
        summary.window_days = window_days;
        summary
    }
}
