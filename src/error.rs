//! Error types for the derivation engine

use thiserror::Error;

/// Main error type for configuration derivation
///
/// Every failure aborts the whole derivation immediately: there is no local
/// recovery, no default substitution, and no partial target record. Each
/// variant carries the offending value so the caller can render a diagnostic.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An endpoint string failed host:port parsing
    #[error("malformed endpoint '{0}': expected host:port")]
    MalformedEndpoint(String),

    /// A DNS domain failed DNS-1123 subdomain validation
    #[error(
        "invalid DNS name '{0}': a DNS-1123 subdomain must consist of lower case \
         alphanumeric characters, '-' or '.', and must start and end with an \
         alphanumeric character (e.g. 'example.com')"
    )]
    InvalidDnsDomain(String),

    /// A container runtime engine name is not in the known-engine table
    #[error("unknown runtime engine {0}")]
    UnsupportedRuntime(String),

    /// A bootstrap token string failed parsing
    #[error("invalid bootstrap token: {0}")]
    InvalidToken(String),

    /// Serialization of the derived configuration failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a malformed-endpoint error for the given endpoint string
    pub fn malformed_endpoint(endpoint: impl Into<String>) -> Self {
        Self::MalformedEndpoint(endpoint.into())
    }

    /// Create an invalid-DNS-domain error for the given domain
    pub fn invalid_dns_domain(domain: impl Into<String>) -> Self {
        Self::InvalidDnsDomain(domain.into())
    }

    /// Create an unsupported-runtime error for the given engine name
    pub fn unsupported_runtime(engine: impl Into<String>) -> Self {
        Self::UnsupportedRuntime(engine.into())
    }

    /// Create an invalid-token error with the given message
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
