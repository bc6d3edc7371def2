pub mod error;
pub mod config;
pub mod loader;
pub mod ordering;
pub mod providers;
pub mod request;
pub mod retry;
pub mod failover;
pub mod audit;
pub mod stats;
pub mod client;
use serde::{Deserialize, Serialize};

pub use audit::{AuditSink, ContingencyLogEntry, InMemoryAuditLog};
pub use client::ContingencyBackend;
pub use config::{ContingencyPolicy, Provider, ProviderCatalog};
pub use error::Error;
pub use failover::{FailoverOrchestrator, ProviderCheck};
pub use loader::{ConfigSnapshot, ConfigSource, PolicyLoader};
pub use providers::{Completion, ProviderInvoker};
pub use request::{GenerationRequest, GenerationResult};
pub use retry::{RetryController, Sleeper, TokioSleeper};
pub use stats::{ContingencyStats, StatsSummary};

/*

allm-contingency routes one generation request across several
interchangeable AI providers. Providers are tried one at a time in
priority order, each with a bounded retry budget; when the provider
that finally answers is not the first one tried, a contingency event
is appended to the audit log.

allm-contingency/
├── src/
│   ├── lib.rs          # Re-exports, provider keys, backend channels
│   ├── error.rs        # Error taxonomy
│   ├── config.rs       # Provider catalog, policy, settings record
│   ├── loader.rs       # Cached, atomically reloadable snapshot
│   ├── ordering.rs     # Candidate list construction
│   ├── providers/      # Invoker boundary + HTTP vendor clients
│   ├── request.rs      # Request/result types
│   ├── retry.rs        # Same-provider retry with delay
│   ├── failover.rs     # Cross-provider failover loop
│   ├── audit.rs        # Append-only contingency log
│   ├── stats.rs        # Aggregation over the log
│   └── client.rs       # Channel-driven backend task
└── tests/

*/

/// CONTINGENCY API INTERFACE:

// ===== Generate =====

pub type GenerateReply
  = Result<crate::GenerationResult, crate::error::Error>;
pub type GenerateReplySender
  = tokio::sync::mpsc::UnboundedSender<GenerateReply>;

pub struct GenerateArgs
{   pub request: crate::GenerationRequest
  , pub preferred_provider: Option<String>
  , pub cancel: tokio_util::sync::CancellationToken
  , pub reply: GenerateReplySender
}

// ===== ReloadConfiguration =====

pub type ReloadReply = Result<(), crate::error::Error>;
pub type ReloadReplySender
  = tokio::sync::mpsc::UnboundedSender<ReloadReply>;

pub struct ReloadArgs
{   pub reply: ReloadReplySender
}

// ===== GetContingencyStats =====

pub type StatsReply = crate::StatsSummary;
pub type StatsReplySender
  = tokio::sync::mpsc::UnboundedSender<StatsReply>;

pub struct StatsArgs
{   pub window_days: u32
  , pub reply: StatsReplySender
}

// ===== TestProvider =====

pub type TestProviderReply = crate::ProviderCheck;
pub type TestProviderReplySender
  = tokio::sync::mpsc::UnboundedSender<TestProviderReply>;

pub struct TestProviderArgs
{   pub provider_key: String
  , pub reply: TestProviderReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== ContingencyHand (sender side) =====

pub struct ContingencyHand
{   pub generate_tx
      : tokio::sync::mpsc::UnboundedSender<GenerateArgs>
  , pub reload_tx
      : tokio::sync::mpsc::UnboundedSender<ReloadArgs>
  , pub stats_tx
      : tokio::sync::mpsc::UnboundedSender<StatsArgs>
  , pub test_provider_tx
      : tokio::sync::mpsc::UnboundedSender<TestProviderArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== ContingencyFoot (receiver side) =====

pub struct ContingencyFoot
{   pub generate_rx
      : tokio::sync::mpsc::UnboundedReceiver<GenerateArgs>
  , pub reload_rx
      : tokio::sync::mpsc::UnboundedReceiver<ReloadArgs>
  , pub stats_rx
      : tokio::sync::mpsc::UnboundedReceiver<StatsArgs>
  , pub test_provider_rx
      : tokio::sync::mpsc::UnboundedReceiver<TestProviderArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}

/// CONTINGENCY STRUCTURES:

/// Every AI backend the orchestrator knows how to route to.
/// Serialized as the lowercase key used by the settings store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash
, Deserialize, Serialize
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKey
{
  /// OpenAI (GPT-4, etc.)
  OpenAI
  ,
  /// Anthropic (Claude models)
  Anthropic
  ,
  /// Google (Gemini)
  Gemini
  ,
  /// OpenRouter (unified API over many providers)
  OpenRouter
  ,
  /// Kilocode
  Kilocode
}

impl ProviderKey
{   /// All known keys, in declaration order
    pub const ALL: [ProviderKey; 5] = [
      ProviderKey::OpenAI
    , ProviderKey::Anthropic
    , ProviderKey::Gemini
    , ProviderKey::OpenRouter
    , ProviderKey::Kilocode
    ];

    /// Stable short identifier
    pub fn as_str(&self) -> &'static str
    {   match self
        {   ProviderKey::OpenAI => "openai"
          , ProviderKey::Anthropic => "anthropic"
          , ProviderKey::Gemini => "gemini"
          , ProviderKey::OpenRouter => "openrouter"
          , ProviderKey::Kilocode => "kilocode"
        }
    }

    /// Parse a stored key; unknown keys yield `None`
    pub fn parse(key: &str) -> Option<ProviderKey>
    {   ProviderKey::ALL
          .iter()
          .copied()
          .find(|k| k.as_str() == key.trim())
    }

    /// Human label shown in diagnostics
    pub fn display_name(&self) -> &'static str
    {   match self
        {   ProviderKey::OpenAI => "OpenAI"
          , ProviderKey::Anthropic => "Claude (Anthropic)"
          , ProviderKey::Gemini => "Google Gemini"
          , ProviderKey::OpenRouter => "OpenRouter"
          , ProviderKey::Kilocode => "Kilocode"
        }
    }

    /// Model requested when the settings leave it blank
    pub fn default_model(&self) -> &'static str
    {   match self
        {   ProviderKey::OpenAI => "gpt-4"
          , ProviderKey::Anthropic => "claude-3-sonnet-20240229"
          , ProviderKey::Gemini => "gemini-2.0-flash-exp"
          , ProviderKey::OpenRouter => "openai/gpt-4"
          , ProviderKey::Kilocode => "kilocode-model"
        }
    }
}

impl std::fmt::Display for ProviderKey
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKey
{   type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   ProviderKey::parse(s).ok_or_else(|| {
          crate::error::Error::Other(
            format!("Unknown provider key: {}", s)
          )
        })
    }
}
