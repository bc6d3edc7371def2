use std::fmt;

/// Error type for contingency operations
/// Implements Clone for sending through channels
///
/// Only `ConfigUnavailable`, `NoEligibleProvider`,
/// `AllProvidersExhausted` and `Cancelled` ever reach a caller of
/// the orchestrator; the rest are absorbed into a reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Configuration could not be loaded or refreshed
    ConfigUnavailable(String)
  , /// No active, credentialed provider to try
    NoEligibleProvider
  , /// Every candidate failed; carries the last reason
    AllProvidersExhausted(String)
  , /// Caller abandoned the request
    Cancelled
  , /// One attempt against one provider failed
    ProviderAttemptFailed(String)
  , /// Audit entry could not be persisted
    AuditLogWriteFailed(String)
  , /// API key is missing for a provider
    MissingApiKey(String)
  , /// Provider not yet implemented
    ProviderNotImplemented(String)
  , /// HTTP request error
    HttpError(String)
  , /// API returned an error response
    ApiError(String)
  , /// Failed to parse API response
    ParseError(String)
  , /// No choices in API response
    NoChoicesInResponse
  , /// Generic error
    Other(String)
}

impl Error
{   /// Whether this error may be handed to a caller as-is
    pub fn is_terminal(&self) -> bool
    {   matches!(
          self
        , Error::ConfigUnavailable(_)
          | Error::NoEligibleProvider
          | Error::AllProvidersExhausted(_)
          | Error::Cancelled
        )
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::ConfigUnavailable(msg) => {
              write!(f, "Configuration unavailable: {}", msg)
            }
          , Error::NoEligibleProvider => {
              write!(f, "No eligible AI provider is active")
            }
          , Error::AllProvidersExhausted(last) => {
              write!(f,
                "All AI providers failed. Last error: {}",
                last
              )
            }
          , Error::Cancelled => {
              write!(f, "Request cancelled")
            }
          , Error::ProviderAttemptFailed(msg) => {
              write!(f, "Provider attempt failed: {}", msg)
            }
          , Error::AuditLogWriteFailed(msg) => {
              write!(f, "Audit log write failed: {}", msg)
            }
          , Error::MissingApiKey(provider) => {
              write!(f, "Missing API key for: {}", provider)
            }
          , Error::ProviderNotImplemented(provider) => {
              write!(f,
                "Provider not yet implemented: {}",
                provider
              )
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError(msg) => {
              write!(f, "API error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoChoicesInResponse => {
              write!(f, "API response contained no content")
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}
