//! Authentication material and the mechanisms that issue it.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Mechanism that produced a set of credentials.
///
/// Serialized with the provider-name tags used in cache files. Unrecognized
/// tags read back as [`CredentialOrigin::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialOrigin {
    /// Temporary credentials from an assumed-role exchange
    #[serde(rename = "AssumeRoleProvider")]
    AssumeRole,
    /// Long-lived keys supplied directly
    #[serde(rename = "StaticProvider")]
    Static,
    /// Keys read from environment variables
    #[serde(rename = "EnvProvider")]
    Environment,
    /// Keys read from a shared credentials file
    #[serde(rename = "SharedCredentialsProvider")]
    SharedProfile,
    /// Keys served by the instance metadata endpoint
    #[serde(rename = "EC2RoleProvider")]
    InstanceRole,
    /// Any other mechanism
    #[serde(other)]
    Unknown,
}

impl CredentialOrigin {
    /// Whether credentials of this origin are persisted to the disk cache.
    ///
    /// Only assumed-role exchanges are cached: they are slow, rate limited
    /// and may require interactive MFA.
    pub fn is_cacheable(self) -> bool {
        matches!(self, Self::AssumeRole)
    }

    /// Provider-name tag used in cache files.
    pub fn provider_name(self) -> &'static str {
        match self {
            Self::AssumeRole => "AssumeRoleProvider",
            Self::Static => "StaticProvider",
            Self::Environment => "EnvProvider",
            Self::SharedProfile => "SharedCredentialsProvider",
            Self::InstanceRole => "EC2RoleProvider",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.provider_name())
    }
}

/// Access key, secret key and session token, zeroed on drop.
///
/// # Example
///
/// ```rust
/// use cloudsync_core::credentials::{CredentialOrigin, Credentials};
///
/// let creds = Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI", None, CredentialOrigin::Static);
/// assert_eq!(creds.access_key_id(), "AKIDEXAMPLE");
/// assert!(creds.session_token().is_none());
/// assert!(!format!("{:?}", creds).contains("wJalrXUtnFEMI"));
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "AccessKeyID")]
    access_key_id: Zeroizing<String>,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: Zeroizing<String>,
    #[serde(rename = "SessionToken", default)]
    session_token: Zeroizing<String>,
    #[serde(rename = "ProviderName")]
    #[zeroize(skip)]
    origin: CredentialOrigin,
}

impl Credentials {
    /// Creates credentials issued by `origin`.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        origin: CredentialOrigin,
    ) -> Self {
        Self {
            access_key_id: Zeroizing::new(access_key_id.into()),
            secret_access_key: Zeroizing::new(secret_access_key.into()),
            session_token: Zeroizing::new(session_token.unwrap_or_default()),
            origin,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Session token, if the credentials are temporary.
    pub fn session_token(&self) -> Option<&str> {
        Some(self.session_token.as_str()).filter(|token| !token.is_empty())
    }

    pub fn origin(&self) -> CredentialOrigin {
        self.origin
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"****")
            .field("secret_access_key", &"****")
            .field("has_session_token", &self.session_token().is_some())
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_assume_role_is_cacheable() {
        assert!(CredentialOrigin::AssumeRole.is_cacheable());
        for origin in [
            CredentialOrigin::Static,
            CredentialOrigin::Environment,
            CredentialOrigin::SharedProfile,
            CredentialOrigin::InstanceRole,
            CredentialOrigin::Unknown,
        ] {
            assert!(!origin.is_cacheable(), "{} must not be cached", origin);
        }
    }

    #[test]
    fn test_origin_tags() {
        let json = serde_json::to_string(&CredentialOrigin::AssumeRole).unwrap();
        assert_eq!(json, "\"AssumeRoleProvider\"");

        let origin: CredentialOrigin = serde_json::from_str("\"EnvProvider\"").unwrap();
        assert_eq!(origin, CredentialOrigin::Environment);

        let origin: CredentialOrigin = serde_json::from_str("\"SSOProvider\"").unwrap();
        assert_eq!(origin, CredentialOrigin::Unknown);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI",
            Some("FwoGZXIvYXdzEBY".to_string()),
            CredentialOrigin::AssumeRole,
        );
        let debug = format!("{:?}", creds);

        assert!(!debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert!(!debug.contains("FwoGZXIvYXdzEBY"));
        assert!(debug.contains("AssumeRole"));
    }

    #[test]
    fn test_session_token() {
        let creds = Credentials::new("id", "secret", Some(String::new()), CredentialOrigin::Static);
        assert!(creds.session_token().is_none());

        let creds = Credentials::new("id", "secret", Some("token".to_string()), CredentialOrigin::Static);
        assert_eq!(creds.session_token(), Some("token"));
    }

    #[test]
    fn test_wire_field_names() {
        let creds = Credentials::new("id", "secret", None, CredentialOrigin::AssumeRole);
        let value = serde_json::to_value(&creds).unwrap();

        assert_eq!(value["AccessKeyID"], "id");
        assert_eq!(value["SecretAccessKey"], "secret");
        assert_eq!(value["SessionToken"], "");
        assert_eq!(value["ProviderName"], "AssumeRoleProvider");
    }
}
