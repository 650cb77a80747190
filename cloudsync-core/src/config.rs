//! Configuration for synchronization passes and the credential cache.
//!
//! # Sync flags
//! Sync flags are dotted boolean keys looked up with a default:
//! - `<service>.sync` enables or disables a whole service (default: enabled)
//! - `<service>.<resourceType>.sync` enables or disables one resource type
//!   of that service (default: enabled)
//!
//! # Cache root
//! The credential cache root is passed in explicitly. When it is absent the
//! cache is bypassed entirely.

use crate::{Result, error::SyncError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lifetime given to freshly cached assumed-role credentials.
pub const DEFAULT_ASSUME_ROLE_DURATION: Duration = Duration::from_secs(15 * 60);

/// Name of the directory created under the cache root.
pub const CREDENTIALS_DIR: &str = "credentials";

/// Read-only sync configuration consulted during a pass.
///
/// # Example
/// ```rust
/// use cloudsync_core::config::SyncConfig;
///
/// let config = SyncConfig::new()
///     .with_flag("infra.subnet.sync", false)
///     .with_max_concurrency(4);
///
/// assert!(config.service_enabled("infra"));
/// assert!(config.resource_enabled("infra", "instance"));
/// assert!(!config.resource_enabled("infra", "subnet"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Dotted boolean keys; keys nobody asks about are kept and ignored
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    /// Maximum number of concurrent fetch tasks per phase.
    ///
    /// `None` means one task per enabled resource type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

impl SyncConfig {
    /// Creates an empty configuration where everything is enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a boolean flag.
    pub fn with_flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.flags.insert(key.into(), value);
        self
    }

    /// Caps the number of concurrent fetch tasks per phase.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency.max(1)); // Ensure at least 1
        self
    }

    /// Looks up a boolean flag, falling back to `default` when absent.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.flags.get(key).copied().unwrap_or(default)
    }

    /// Whether the service-wide `<service>.sync` flag is on.
    pub fn service_enabled(&self, service: &str) -> bool {
        self.get_bool(&format!("{}.sync", service), true)
    }

    /// Whether the `<service>.<resourceType>.sync` flag is on.
    pub fn resource_enabled(&self, service: &str, resource_type: &str) -> bool {
        self.get_bool(&format!("{}.{}.sync", service, resource_type), true)
    }

    /// Effective fan-out width for a phase with `tasks` pending tasks.
    pub fn concurrency_for(&self, tasks: usize) -> usize {
        self.max_concurrency.unwrap_or(tasks).max(1)
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    /// Returns a serialization error for malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::Serialization {
            context: "Failed to parse sync configuration".to_string(),
            source: e,
        })
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, or a serialization
    /// error if its contents are malformed.
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::io(format!("Failed to read {}", path.display()), e))?;
        Self::from_json_str(&content)
    }
}

/// Credential cache settings, injected at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Root directory of the cache; `None` disables caching
    pub cache_root: Option<PathBuf>,
    /// Profile whose credentials are cached
    pub profile: String,
    /// Lifetime stamped on newly cached assumed-role credentials
    pub session_duration: Duration,
}

impl CacheConfig {
    /// Creates a cache configuration for `profile` with caching disabled.
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            cache_root: None,
            profile: profile.into(),
            session_duration: DEFAULT_ASSUME_ROLE_DURATION,
        }
    }

    /// Enables caching under `root`.
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Overrides the lifetime of cached assumed-role credentials.
    pub fn with_session_duration(mut self, session_duration: Duration) -> Self {
        self.session_duration = session_duration;
        self
    }

    /// Directory holding cached credential files, if caching is enabled.
    pub fn credentials_dir(&self) -> Option<PathBuf> {
        self.cache_root.as_ref().map(|root| root.join(CREDENTIALS_DIR))
    }

    /// Cache file for the configured profile, if caching is enabled.
    pub fn cache_file(&self) -> Option<PathBuf> {
        self.credentials_dir()
            .map(|dir| dir.join(format!("aws-profile-{}.json", self.profile)))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a configuration error if the profile is empty or could escape
    /// the credentials directory, or if the session duration is zero.
    pub fn validate(&self) -> Result<()> {
        if self.profile.trim().is_empty() {
            return Err(SyncError::configuration("Profile name cannot be empty"));
        }
        if self.profile.contains(['/', '\\']) || matches!(self.profile.as_str(), "." | "..") {
            return Err(SyncError::configuration(format!(
                "Profile name '{}' must not contain path components",
                self.profile
            )));
        }
        if self.session_duration.is_zero() {
            return Err(SyncError::configuration(
                "Session duration must be greater than zero",
            ));
        }
        Ok(())
    }
}
