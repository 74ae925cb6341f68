//! Kubeinit - derivation of kubeadm init configurations from bootstrap intent
//!
//! Kubeinit turns a loosely-typed, partially-populated configuration tree
//! (user-supplied cluster bootstrap intent) into a fully-typed, internally
//! consistent [`config::InitConfiguration`] ready for `kubeadm init`.
//!
//! # Architecture
//!
//! The derivation is a single synchronous transform:
//! - Every input read is get-if-present: absent paths are no-ops, never errors
//! - Defaults are only ever added to or overwritten, never cleared
//! - The first validation failure aborts the whole derivation (all-or-nothing)
//!
//! # Modules
//!
//! - [`source`] - Get-if-present access to the hierarchical source tree
//! - [`config`] - The typed target record (kubeadm init configuration)
//! - [`derive`] - The derivation engine itself
//! - [`token`] - Bootstrap token parsing and generation
//! - [`dns`] - DNS-1123 subdomain validation
//! - [`error`] - Error types for the engine

#![deny(missing_docs)]

pub mod config;
pub mod derive;
pub mod dns;
pub mod error;
pub mod source;
pub mod token;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// These constants define the fixed defaults the derivation injects. They are
// process-wide and read-only; centralizing them here keeps the derivation
// steps and the test fixtures consistent.

/// Default port for the Kubernetes API server
///
/// Appended to an external control-plane endpoint when the user did not
/// specify a port of their own.
pub const DEFAULT_API_SERVER_PORT: u16 = 6443;

/// Upstream resolv.conf path used when custom DNS upstream servers are set
///
/// Points at the systemd-resolved upstream file so the kubelet bypasses any
/// local caching stub resolver.
pub const DEFAULT_RESOLV_UPSTREAM_CONF: &str = "/run/systemd/resolve/resolv.conf";

/// Default time-to-live for a freshly parsed bootstrap token
///
/// The derivation engine deliberately clears the expiry again (tokens stored
/// in the derived configuration never expire, keeping the bootstrap window
/// open for slow nodes); the default only exists so that token construction
/// in other contexts starts from a bounded lifetime.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
