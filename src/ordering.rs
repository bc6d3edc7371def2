//! Candidate list construction

use log::{debug, trace};
use crate::config::{ContingencyPolicy, Provider, ProviderCatalog};
use crate::ProviderKey;

/// Eligible providers in the order they should be tried.
///
/// Inactive or uncredentialed providers are dropped, the rest sorted
/// by priority (unset sorts last, ties by key). A `preferred` key
/// that survives the filter moves to the front; one that does not
/// is ignored. An empty list is a valid answer.
pub fn order(
  catalog: &ProviderCatalog
, policy: &ContingencyPolicy
, preferred: Option<ProviderKey>
) -> Vec<Provider>
{   let mut candidates: Vec<Provider> = catalog
      .providers()
      .iter()
      .filter(|p| p.is_eligible())
      .cloned()
      .collect();

    candidates.sort_by(|a, b| {
      policy.priority_of(a.key)
        .cmp(&policy.priority_of(b.key))
        .then_with(|| a.key.as_str().cmp(b.key.as_str()))
    });

    if let Some(key) = preferred
    {   match candidates.iter().position(|p| p.key == key)
        {   Some(index) => {
              let provider = candidates.remove(index);
              candidates.insert(0, provider);
              debug!("Preferred provider {} moved to front", key);
            }
          , None => {
              debug!(
                "Preferred provider {} not eligible, ignoring",
                key
              );
            }
        }
    }

    trace!(
      "Candidate order: {:?}",
      candidates.iter().map(|p| p.key.as_str()).collect::<Vec<_>>()
    );
    candidates
}
