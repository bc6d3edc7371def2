use std::collections::HashMap;
use std::time::Duration;

use allm_contingency::config::{ContingencyPolicy, Provider, ProviderCatalog};
use allm_contingency::ordering::order;
use allm_contingency::ProviderKey;

fn provider(key: ProviderKey, active: bool, credential: &str) -> Provider
{   Provider
    {   key
      , display_name: key.display_name().to_string()
      , active
      , credential: credential.to_string()
      , model: key.default_model().to_string()
    }
}

fn policy(priorities: &[(ProviderKey, i64)]) -> ContingencyPolicy
{   ContingencyPolicy
    {   failover_enabled: true
      , priority_by_provider_key: priorities.iter().copied().collect::<HashMap<_, _>>()
      , retry_enabled: true
      , max_attempts_per_provider: 2
      , retry_delay: Duration::from_secs(1)
    }
}

fn keys(providers: &[Provider]) -> Vec<ProviderKey>
{   providers.iter().map(|p| p.key).collect()
}

fn three_active() -> ProviderCatalog
{   ProviderCatalog::new(vec![
      provider(ProviderKey::Anthropic, true, "sk-a")
    , provider(ProviderKey::OpenAI, true, "sk-o")
    , provider(ProviderKey::Gemini, true, "sk-g")
    ])
}

#[test]
fn test_sorts_by_priority_ascending()
{   let catalog = three_active();
    let policy = policy(&[
      (ProviderKey::Gemini, 1)
    , (ProviderKey::OpenAI, 2)
    , (ProviderKey::Anthropic, 3)
    ]);

    let ordered = order(&catalog, &policy, None);
    assert_eq!(
      keys(&ordered),
      vec![ProviderKey::Gemini, ProviderKey::OpenAI, ProviderKey::Anthropic]
    );
}

#[test]
fn test_filters_inactive_and_uncredentialed()
{   let catalog = ProviderCatalog::new(vec![
      provider(ProviderKey::OpenAI, false, "sk-o")
    , provider(ProviderKey::Anthropic, true, "")
    , provider(ProviderKey::Gemini, true, "sk-g")
    , provider(ProviderKey::OpenRouter, true, "   ")
    ]);
    let policy = policy(&[]);

    let ordered = order(&catalog, &policy, None);
    assert_eq!(keys(&ordered), vec![ProviderKey::Gemini]);
}

#[test]
fn test_missing_priority_sorts_last_and_ties_break_by_key()
{   let catalog = ProviderCatalog::new(vec![
      provider(ProviderKey::OpenRouter, true, "k")
    , provider(ProviderKey::Kilocode, true, "k")
    , provider(ProviderKey::OpenAI, true, "k")
    , provider(ProviderKey::Gemini, true, "k")
    ]);
    // openai and gemini tie at 5, the other two have no priority
    let policy = policy(&[(ProviderKey::OpenAI, 5), (ProviderKey::Gemini, 5)]);

    let ordered = order(&catalog, &policy, None);
    assert_eq!(
      keys(&ordered),
      vec![
        ProviderKey::Gemini
      , ProviderKey::OpenAI
      , ProviderKey::Kilocode
      , ProviderKey::OpenRouter
      ]
    );
}

#[test]
fn test_preferred_provider_moves_to_front()
{   let catalog = three_active();
    let policy = policy(&[
      (ProviderKey::Gemini, 1)
    , (ProviderKey::OpenAI, 2)
    , (ProviderKey::Anthropic, 3)
    ]);

    let ordered = order(&catalog, &policy, Some(ProviderKey::Anthropic));
    assert_eq!(
      keys(&ordered),
      vec![ProviderKey::Anthropic, ProviderKey::Gemini, ProviderKey::OpenAI]
    );
}

#[test]
fn test_ineligible_preferred_provider_is_ignored()
{   let catalog = ProviderCatalog::new(vec![
      provider(ProviderKey::OpenAI, true, "sk-o")
    , provider(ProviderKey::Gemini, true, "sk-g")
    , provider(ProviderKey::Anthropic, false, "sk-a")
    ]);
    let policy = policy(&[(ProviderKey::OpenAI, 1), (ProviderKey::Gemini, 2)]);

    let baseline = order(&catalog, &policy, None);
    for preferred in [ProviderKey::Anthropic, ProviderKey::Kilocode]
    {   let ordered = order(&catalog, &policy, Some(preferred));
        assert_eq!(keys(&ordered), keys(&baseline));
    }
}

#[test]
fn test_empty_catalog_yields_empty_list()
{   let ordered = order(
      &ProviderCatalog::default(),
      &policy(&[]),
      Some(ProviderKey::OpenAI)
    );
    assert!(ordered.is_empty());
}
