//! Credential resolution.
//!
//! Credential storage lives outside this crate; a [`CredentialProvider`]
//! resolves an opaque credential id to a username/password pair. The defaults
//! for missing credentials are applied here, not by providers.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Username used when no credential (or an empty username) is configured.
pub const DEFAULT_USERNAME: &str = "default";

/// Username/password pair.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UsernamePassword {
    pub username: String,
    pub password: String,
}

impl UsernamePassword {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for UsernamePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePassword")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Looks up credentials by id.
pub trait CredentialProvider: Send + Sync {
    fn lookup(&self, id: &str) -> Option<UsernamePassword>;
}

/// Map-backed provider.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, UsernamePassword>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, credential: UsernamePassword) -> Self {
        self.credentials.insert(id.into(), credential);
        self
    }
}

impl From<HashMap<String, UsernamePassword>> for StaticCredentialProvider {
    fn from(credentials: HashMap<String, UsernamePassword>) -> Self {
        Self { credentials }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn lookup(&self, id: &str) -> Option<UsernamePassword> {
        self.credentials.get(id).cloned()
    }
}

/// Resolve a credential id, applying defaults.
///
/// - no id, empty id, or unknown id: `("default", "")`
/// - credential with empty username: username `"default"`
pub fn resolve_credentials(
    provider: &dyn CredentialProvider,
    credentials_id: Option<&str>,
) -> UsernamePassword {
    let credential = credentials_id
        .filter(|id| !id.is_empty())
        .and_then(|id| provider.lookup(id));

    match credential {
        Some(c) if c.username.is_empty() => UsernamePassword::new(DEFAULT_USERNAME, c.password),
        Some(c) => c,
        None => UsernamePassword::new(DEFAULT_USERNAME, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StaticCredentialProvider {
        StaticCredentialProvider::new()
            .with("ops", UsernamePassword::new("ops-user", "s3cret"))
            .with("anon", UsernamePassword::new("", "only-password"))
    }

    #[test]
    fn test_resolves_known_credential() {
        let c = resolve_credentials(&provider(), Some("ops"));
        assert_eq!(c, UsernamePassword::new("ops-user", "s3cret"));
    }

    #[test]
    fn test_missing_id_uses_default() {
        let c = resolve_credentials(&provider(), None);
        assert_eq!(c, UsernamePassword::new("default", ""));

        let c = resolve_credentials(&provider(), Some(""));
        assert_eq!(c, UsernamePassword::new("default", ""));
    }

    #[test]
    fn test_unknown_id_uses_default() {
        let c = resolve_credentials(&provider(), Some("nope"));
        assert_eq!(c, UsernamePassword::new("default", ""));
    }

    #[test]
    fn test_empty_username_becomes_default() {
        let c = resolve_credentials(&provider(), Some("anon"));
        assert_eq!(c, UsernamePassword::new("default", "only-password"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", UsernamePassword::new("u", "hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
