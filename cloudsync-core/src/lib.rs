//! Concurrent cloud resource synchronization and credential caching.
//!
//! This crate assembles an in-memory graph of a cloud account's resources
//! by running many independent list/describe calls concurrently, and caches
//! assumed-role credentials on disk so repeated runs skip the exchange.
//!
//! # Guarantees
//! - A synchronization pass always returns its graph, even when some
//!   resource types failed; failures are aggregated next to it
//! - Graph content depends only on the enabled resource types, never on the
//!   order in which fetches complete
//! - Key material is zeroed on drop and never logged or shown in errors
//!
//! # Architecture
//! - `fetch`: per-type descriptors driving an opaque [`fetch::ListApi`]
//! - `sync`: the two-phase orchestrator and service registry
//! - `credentials`: the caching credentials provider
//! - `models`: the resource graph
//!
//! Provider API calls and the authentication exchange itself stay behind
//! traits implemented by the embedding application.

pub mod config;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod sync;

// Re-export commonly used types
pub use config::{CacheConfig, SyncConfig};
pub use credentials::{
    CachingCredentialsProvider, CredentialOrigin, Credentials, CredentialsProvider,
};
pub use error::{Result, SyncError};
pub use fetch::{FetchDescriptor, ListApi, Page, RawRecord};
pub use models::{Graph, Relation, Resource, ResourceKey};
pub use sync::{AggregatedError, FetchOutcome, ServiceFetcher, ServiceRegistry};
