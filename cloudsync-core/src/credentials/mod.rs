//! Provider credentials and their on-disk cache.
//!
//! This module provides:
//! - `Credentials`: key material zeroed on drop, never shown in debug output
//! - `CredentialOrigin`: closed set of issuing mechanisms with a cacheable flag
//! - `CredentialsProvider`: the retrieval seam wrapped by the cache
//! - `CachingCredentialsProvider`: expiry-driven, per-profile disk memoization
//!
//! # Module Structure
//! - `value`: key material and origins
//! - `cache`: cache file format and the caching provider

mod cache;
mod value;

pub use cache::{CachedCredential, CachingCredentialsProvider};
pub use value::{CredentialOrigin, Credentials};

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Source of authentication material.
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn CredentialsProvider>` or `Arc<dyn CredentialsProvider>`.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Returns usable credentials, performing an exchange if needed.
    ///
    /// # Errors
    /// Returns a credential-retrieval error if the exchange fails.
    async fn retrieve(&self) -> Result<Credentials>;

    /// Whether the most recently retrieved credentials have expired.
    fn is_expired(&self) -> bool;
}

#[async_trait]
impl<T> CredentialsProvider for Arc<T>
where
    T: CredentialsProvider + ?Sized,
{
    async fn retrieve(&self) -> Result<Credentials> {
        (**self).retrieve().await
    }

    fn is_expired(&self) -> bool {
        (**self).is_expired()
    }
}

/// Provider returning a fixed set of keys that never expire.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        origin: CredentialOrigin,
    ) -> Self {
        Self {
            credentials: Credentials::new(access_key_id, secret_access_key, None, origin),
        }
    }
}

#[async_trait]
impl CredentialsProvider for StaticProvider {
    async fn retrieve(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }

    fn is_expired(&self) -> bool {
        false
    }
}
