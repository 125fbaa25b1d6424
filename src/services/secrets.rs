// Secrets access for the Sentra backend
// One real implementation reads the process environment; tests substitute a
// static map. Cryptographic material is read once at startup and held in
// derived form (see KeyProvider).

use std::collections::HashMap;
use thiserror::Error;

/// Minimum length for HMAC signing material (256 bits)
pub const MIN_SIGNING_SECRET_BYTES: usize = 32;

/// Name of the signing secret in the environment
pub const SIGNING_SECRET_NAME: &str = "JWT_SECRET";

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Missing required secret: {0}")]
    Missing(String),

    #[error("Invalid secret {0}: {1}")]
    Invalid(String, String),
}

/// Read access to named deployment secrets
pub trait SecretsProvider: Send + Sync {
    /// Fetch a named secret; unset or blank values fail with `Missing`
    fn get(&self, name: &str) -> Result<String, SecretsError>;

    /// The token signing secret, validated to at least 32 bytes
    fn signing_secret(&self) -> Result<String, SecretsError> {
        let secret = self.get(SIGNING_SECRET_NAME)?;
        if secret.len() < MIN_SIGNING_SECRET_BYTES {
            return Err(SecretsError::Invalid(
                SIGNING_SECRET_NAME.to_string(),
                format!(
                    "must be at least {} bytes (current: {})",
                    MIN_SIGNING_SECRET_BYTES,
                    secret.len()
                ),
            ));
        }
        Ok(secret)
    }
}

/// Secrets sourced from the process environment
pub struct EnvSecrets;

impl SecretsProvider for EnvSecrets {
    fn get(&self, name: &str) -> Result<String, SecretsError> {
        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(SecretsError::Missing(name.to_string())),
        }
    }
}

/// Fixed in-memory secrets for tests
#[derive(Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl SecretsProvider for StaticSecrets {
    fn get(&self, name: &str) -> Result<String, SecretsError> {
        match self.values.get(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.clone()),
            _ => Err(SecretsError::Missing(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_secrets_lookup() {
        let secrets = StaticSecrets::new().with("API_KEY", "abc123");

        assert_eq!(secrets.get("API_KEY").unwrap(), "abc123");
        assert!(matches!(
            secrets.get("OTHER_KEY"),
            Err(SecretsError::Missing(name)) if name == "OTHER_KEY"
        ));
    }

    #[test]
    fn test_blank_secret_is_missing() {
        let secrets = StaticSecrets::new().with("EMPTY", "   ");
        assert!(matches!(secrets.get("EMPTY"), Err(SecretsError::Missing(_))));
    }

    #[test]
    fn test_signing_secret_length_policy() {
        let short = StaticSecrets::new().with(SIGNING_SECRET_NAME, "too-short");
        assert!(matches!(
            short.signing_secret(),
            Err(SecretsError::Invalid(name, _)) if name == SIGNING_SECRET_NAME
        ));

        let ok = StaticSecrets::new().with(
            SIGNING_SECRET_NAME,
            "a-signing-secret-of-at-least-32-bytes!!",
        );
        assert!(ok.signing_secret().is_ok());
    }
}
