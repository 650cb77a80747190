//! Disk-persisted credential cache keyed by profile.
//!
//! The cache wraps another [`CredentialsProvider`]. Every retrieval first
//! looks for `<cache_root>/credentials/aws-profile-<profile>.json`; a
//! non-expired entry is returned without touching the wrapped provider.
//! Otherwise the wrapped provider is called and, if it performed an
//! assumed-role exchange, its credentials are written back to the cache.
//!
//! There is no locking across processes: two invocations sharing a profile
//! can both miss and both write. The last write wins.

use super::{CredentialsProvider, Credentials};
use crate::{Result, config::CacheConfig, error::SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Credentials together with the instant they stop being usable.
///
/// Usable iff `now < expiration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(rename = "Expiration")]
    pub expiration: DateTime<Utc>,
}

impl CachedCredential {
    /// Stamps `credentials` with an expiration `lifetime` after `issued_at`.
    ///
    /// # Errors
    /// Returns a configuration error if the expiration is not representable.
    pub fn issue(
        credentials: Credentials,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self> {
        let expiration = chrono::Duration::from_std(lifetime)
            .ok()
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                SyncError::configuration(format!(
                    "Session duration of {}s overflows the expiration timestamp",
                    lifetime.as_secs()
                ))
            })?;

        Ok(Self {
            credentials,
            expiration,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    /// Reads a cached credential file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or a cache-read error
    /// if it does not hold a cached credential.
    pub async fn read_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| SyncError::io(format!("Failed to read {}", path.display()), e))?;

        serde_json::from_slice(&content).map_err(|e| SyncError::CacheRead {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes this credential to `path`, readable and writable by the owner only.
    ///
    /// # Errors
    /// Returns a serialization or I/O error if the file cannot be written.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec(self).map_err(|e| SyncError::Serialization {
            context: "Failed to serialize cached credentials".to_string(),
            source: e,
        })?;
        let write_error =
            |e: std::io::Error| SyncError::io(format!("Failed to write {}", path.display()), e);

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await.map_err(write_error)?;
        file.write_all(&content).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        // mode() only applies on creation; tighten a pre-existing file too
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(write_error)?;
        }

        Ok(())
    }
}

/// Creates the credentials directory with owner-only permissions.
async fn create_credentials_dir(dir: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);

    builder
        .create(dir)
        .await
        .map_err(|e| SyncError::io(format!("Failed to create {}", dir.display()), e))
}

/// [`CredentialsProvider`] that memoizes assumed-role credentials on disk.
///
/// # Example
///
/// ```rust,no_run
/// use cloudsync_core::config::CacheConfig;
/// use cloudsync_core::credentials::{
///     CachingCredentialsProvider, CredentialOrigin, CredentialsProvider, StaticProvider,
/// };
///
/// # async fn example() -> cloudsync_core::Result<()> {
/// let inner = StaticProvider::new("AKIDEXAMPLE", "secret", CredentialOrigin::Static);
/// let config = CacheConfig::new("dev").with_cache_root("/home/me/.cloudsync");
/// let provider = CachingCredentialsProvider::new(inner, config)?;
///
/// let creds = provider.retrieve().await?;
/// # Ok(())
/// # }
/// ```
pub struct CachingCredentialsProvider<P> {
    inner: P,
    config: CacheConfig,
    current: Mutex<Option<CachedCredential>>,
}

impl<P: CredentialsProvider> CachingCredentialsProvider<P> {
    /// Wraps `inner` with the cache described by `config`.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate.
    pub fn new(inner: P, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner,
            config,
            current: Mutex::new(None),
        })
    }

    /// Cache file for this profile, or `None` when caching is disabled.
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.config.cache_file()
    }

    /// Loads the cache file, treating anything unusable as a miss.
    async fn load_cached(&self, path: &Path) -> Option<CachedCredential> {
        match CachedCredential::read_from(path).await {
            Ok(cached) => {
                debug!("loading credentials from '{}'", path.display());
                Some(cached)
            }
            Err(SyncError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                None
            }
            Err(e) => {
                warn!("Ignoring unusable credential cache: {}", e);
                None
            }
        }
    }

    /// Persists freshly issued assumed-role credentials.
    async fn store(&self, path: &Path, credentials: &Credentials) {
        let cached = match CachedCredential::issue(
            credentials.clone(),
            Utc::now(),
            self.config.session_duration,
        ) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Not caching credentials: {}", e);
                *self.current.lock() = None;
                return;
            }
        };

        match cached.write_to(path).await {
            Ok(()) => debug!("credentials cached in '{}'", path.display()),
            Err(e) => warn!("Failed to cache credentials: {}", e),
        }
        *self.current.lock() = Some(cached);
    }
}

#[async_trait]
impl<P: CredentialsProvider> CredentialsProvider for CachingCredentialsProvider<P> {
    async fn retrieve(&self) -> Result<Credentials> {
        let (Some(dir), Some(path)) = (self.config.credentials_dir(), self.config.cache_file())
        else {
            return self.inner.retrieve().await;
        };

        if let Err(e) = create_credentials_dir(&dir).await {
            warn!("{}", e);
        }

        if let Some(cached) = self.load_cached(&path).await {
            if !cached.is_expired() {
                let credentials = cached.credentials.clone();
                *self.current.lock() = Some(cached);
                return Ok(credentials);
            }
            debug!("cached credentials for profile '{}' expired", self.config.profile);
        }

        debug!("no valid cached credentials, getting new credentials");
        let credentials = self.inner.retrieve().await?;

        if credentials.origin().is_cacheable() {
            self.store(&path, &credentials).await;
        } else {
            *self.current.lock() = None;
        }

        Ok(credentials)
    }

    fn is_expired(&self) -> bool {
        match &*self.current.lock() {
            Some(cached) => cached.is_expired(),
            None => self.inner.is_expired(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialOrigin;

    fn assumed_role() -> Credentials {
        Credentials::new(
            "ASIAEXAMPLE",
            "secret",
            Some("token".to_string()),
            CredentialOrigin::AssumeRole,
        )
    }

    #[test]
    fn test_issue_sets_expiration() {
        let issued_at = Utc::now();
        let cached =
            CachedCredential::issue(assumed_role(), issued_at, Duration::from_secs(900)).unwrap();

        assert_eq!(cached.expiration, issued_at + chrono::Duration::minutes(15));
        assert!(!cached.is_expired_at(issued_at));
        assert!(cached.is_expired_at(cached.expiration));
        assert!(cached.is_expired_at(issued_at + chrono::Duration::minutes(16)));
    }

    #[test]
    fn test_issue_rejects_overflow() {
        let result = CachedCredential::issue(assumed_role(), Utc::now(), Duration::MAX);
        assert!(matches!(result, Err(SyncError::Configuration { .. })));
    }

    #[test]
    fn test_cache_file_format() {
        let cached = CachedCredential {
            credentials: assumed_role(),
            expiration: "2030-01-02T03:04:05Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&cached).unwrap();

        assert_eq!(value["AccessKeyID"], "ASIAEXAMPLE");
        assert_eq!(value["SessionToken"], "token");
        assert_eq!(value["ProviderName"], "AssumeRoleProvider");
        assert_eq!(value["Expiration"], "2030-01-02T03:04:05Z");
    }

    #[test]
    fn test_reads_nanosecond_timestamps() {
        let json = r#"{
            "AccessKeyID": "ASIAEXAMPLE",
            "SecretAccessKey": "secret",
            "SessionToken": "token",
            "ProviderName": "AssumeRoleProvider",
            "Expiration": "2030-01-02T03:04:05.123456789Z"
        }"#;
        let cached: CachedCredential = serde_json::from_str(json).unwrap();
        assert_eq!(cached.credentials.origin(), CredentialOrigin::AssumeRole);
        assert!(!cached.is_expired_at("2030-01-02T03:04:05Z".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_cache_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aws-profile-dev.json");
        let cached =
            CachedCredential::issue(assumed_role(), Utc::now(), Duration::from_secs(900)).unwrap();

        cached.write_to(&path).await.unwrap();
        let loaded = CachedCredential::read_from(&path).await.unwrap();

        assert_eq!(loaded, cached);
        assert_eq!(loaded.is_expired(), cached.is_expired());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cache_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let creds_dir = dir.path().join("credentials");
        create_credentials_dir(&creds_dir).await.unwrap();
        let dir_mode = std::fs::metadata(&creds_dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);

        let path = creds_dir.join("aws-profile-dev.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let cached =
            CachedCredential::issue(assumed_role(), Utc::now(), Duration::from_secs(900)).unwrap();
        cached.write_to(&path).await.unwrap();

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_read_garbage_is_cache_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aws-profile-dev.json");
        std::fs::write(&path, "not json").unwrap();

        let err = CachedCredential::read_from(&path).await.unwrap_err();
        assert!(matches!(err, SyncError::CacheRead { .. }));
    }
}
