//! Venue session credentials.
//!
//! The session hash is wrapped in `secrecy::SecretString` so it cannot be
//! logged by accident and is zeroed on drop.

use secrecy::{ExposeSecret, SecretString};

use crate::error::GatewayError;

/// Credentials identifying one venue session.
#[derive(Clone)]
pub struct SessionCredentials {
    user_id: String,
    user_hash: SecretString,
}

impl SessionCredentials {
    /// Load credentials from the environment.
    ///
    /// Looks for `BROKER_USER_ID` and `BROKER_USER_HASH`; a `.env` file is
    /// honored when present.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let user_id = std::env::var("BROKER_USER_ID")
            .map_err(|_| GatewayError::RequestBuild("BROKER_USER_ID is not set".into()))?;
        let user_hash = std::env::var("BROKER_USER_HASH")
            .map_err(|_| GatewayError::RequestBuild("BROKER_USER_HASH is not set".into()))?;

        Ok(Self::new(user_id, user_hash))
    }

    pub fn new(user_id: String, user_hash: String) -> Self {
        Self {
            user_id,
            user_hash: SecretString::from(user_hash),
        }
    }

    /// The user id (public, safe to log).
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Expose the session hash for request signing.
    ///
    /// Never log or display the return value.
    pub fn expose_hash(&self) -> &str {
        self.user_hash.expose_secret()
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("user_id", &self.user_id)
            .field("user_hash", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_accessors() {
        let creds = SessionCredentials::new("42".into(), "deadbeef".into());
        assert_eq!(creds.user_id(), "42");
        assert_eq!(creds.expose_hash(), "deadbeef");
    }

    #[test]
    fn test_debug_redacts_hash() {
        let creds = SessionCredentials::new("42".into(), "deadbeef".into());
        let debug_str = format!("{:?}", creds);

        assert!(debug_str.contains("42"));
        assert!(!debug_str.contains("deadbeef"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
