//! Static AWS credentials.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{AwsError, AwsResult};

/// Access key pair, optionally with a session token.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: session_token.map(SecretString::from),
        }
    }

    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
    /// `AWS_SESSION_TOKEN` from the environment.
    pub fn from_env() -> AwsResult<Self> {
        let access_key_id = non_empty_var("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| AwsError::MissingCredentials("AWS_ACCESS_KEY_ID is not set".into()))?;
        let secret = non_empty_var("AWS_SECRET_ACCESS_KEY").ok_or_else(|| {
            AwsError::MissingCredentials("AWS_SECRET_ACCESS_KEY is not set".into())
        })?;
        Ok(Self::new(
            access_key_id,
            secret,
            non_empty_var("AWS_SESSION_TOKEN"),
        ))
    }

    pub(crate) fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    pub(crate) fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(|t| t.expose_secret())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = AwsCredentials::new("AKIDEXAMPLE", "super-secret", Some("sess-xyz".into()));
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("sess-xyz"));
    }

    #[test]
    fn test_accessors() {
        let creds = AwsCredentials::new("id", "secret", None);
        assert_eq!(creds.secret_access_key(), "secret");
        assert!(creds.session_token().is_none());
    }
}
