// Access token issuance and verification
// HS256 tokens whose header carries the signing key id; verification selects
// material through the KeyProvider, so tokens signed before a rotation stay
// valid for the grace window.

use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::AccessTokenClaims;
use crate::models::user::UserRole;
use crate::services::keys::KeyProvider;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token expired")]
    Expired,

    #[error("Token signed with an unknown key")]
    UnknownKey,

    #[error("Token encoding error: {0}")]
    Encoding(String),
}

/// Token issuance settings
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Access token lifetime in milliseconds
    pub expiration_ms: u64,
    pub audience: String,
    pub issuer: String,
}

impl TokenConfig {
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            expiration_ms: 3_600_000,
            audience: "test.sentra.dev".to_string(),
            issuer: "test.sentra.dev".to_string(),
        }
    }
}

/// Issues and verifies bearer access tokens
pub struct TokenService {
    config: TokenConfig,
    keys: Arc<KeyProvider>,
}

impl TokenService {
    pub fn new(config: TokenConfig, keys: Arc<KeyProvider>) -> Self {
        Self { config, keys }
    }

    /// Access token lifetime in whole seconds (for response bodies)
    pub fn expires_in_seconds(&self) -> u64 {
        self.config.expiration_ms / 1000
    }

    /// Issue an access token for a user, signed with the CURRENT key
    pub fn issue(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<String, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TokenError::Encoding(e.to_string()))?
            .as_secs();

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + self.config.expiration_ms / 1000,
        };

        let (key_id, material) = self.keys.current();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(key_id);

        encode(&header, &claims, &EncodingKey::from_secret(&material))
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify a token and return its claims. The header key id selects the
    /// verification material; tokens without one are rejected outright.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::Invalid)?;
        let key_id = header.kid.ok_or(TokenError::Invalid)?;

        let material = self
            .keys
            .material_by_id(&key_id)
            .ok_or(TokenError::UnknownKey)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let token_data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(&material),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;

        Ok(token_data.claims)
    }

    /// Verified user id claim
    pub fn extract_user_id(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims = self.verify(token)?;
        Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Invalid)
    }

    /// Verified tenant id claim
    pub fn extract_tenant_id(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims = self.verify(token)?;
        Uuid::parse_str(&claims.tenant_id).map_err(|_| TokenError::Invalid)
    }

    /// Verified email claim
    pub fn extract_email(&self, token: &str) -> Result<String, TokenError> {
        Ok(self.verify(token)?.email)
    }

    /// Verified role claim
    pub fn extract_role(&self, token: &str) -> Result<UserRole, TokenError> {
        use std::str::FromStr;

        let claims = self.verify(token)?;
        UserRole::from_str(&claims.role).map_err(|_| TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const MATERIAL_A: &[u8] = b"first-signing-secret-at-least-32-bytes!!";
    const MATERIAL_B: &[u8] = b"second-signing-secret-at-least-32-bytes!";

    fn service_with_grace(grace: Duration) -> TokenService {
        let keys = Arc::new(KeyProvider::new(MATERIAL_A, grace).unwrap());
        TokenService::new(TokenConfig::for_test(), keys)
    }

    fn service() -> (TokenService, Arc<KeyProvider>) {
        let keys = Arc::new(KeyProvider::new(MATERIAL_A, Duration::hours(24)).unwrap());
        (
            TokenService::new(TokenConfig::for_test(), Arc::clone(&keys)),
            keys,
        )
    }

    #[test]
    fn test_issue_verify_round_trip() {
        let (service, _) = service();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let token = service
            .issue(user_id, tenant_id, "admin@acme.com", UserRole::Admin)
            .unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.tenant_id, tenant_id.to_string());
        assert_eq!(claims.email, "admin@acme.com");
        assert_eq!(claims.role, "ADMIN");
        assert!(claims.exp > claims.iat);

        assert_eq!(service.extract_user_id(&token).unwrap(), user_id);
        assert_eq!(service.extract_tenant_id(&token).unwrap(), tenant_id);
        assert_eq!(service.extract_email(&token).unwrap(), "admin@acme.com");
        assert_eq!(service.extract_role(&token).unwrap(), UserRole::Admin);
    }

    #[test]
    fn test_header_carries_key_id() {
        let (service, keys) = service();
        let token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@b.com", UserRole::User)
            .unwrap();

        let header = decode_header(&token).unwrap();
        let (current_id, _) = keys.current();
        assert_eq!(header.kid, Some(current_id));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let (service, _) = service();
        assert!(matches!(
            service.verify("not-a-token"),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            service.verify("a.b.c"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_token_without_key_id_rejected() {
        let (service, _) = service();

        // Sign a structurally valid token with no kid header
        let claims = AccessTokenClaims {
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            tenant_id: Uuid::new_v4().to_string(),
            email: "a@b.com".to_string(),
            role: "USER".to_string(),
            aud: "test.sentra.dev".to_string(),
            iss: "test.sentra.dev".to_string(),
            iat: 0,
            exp: u64::MAX / 2,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(MATERIAL_A),
        )
        .unwrap();

        assert!(matches!(service.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let (service, _) = service();
        let token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@b.com", UserRole::User)
            .unwrap();

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[2] = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string();
        let forged = parts.join(".");

        assert!(matches!(service.verify(&forged), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_old_tokens_verify_during_grace_window() {
        let (service, keys) = service();
        let token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@b.com", UserRole::User)
            .unwrap();

        keys.rotate(MATERIAL_B).unwrap();

        // Grace window of 24h: the pre-rotation token still verifies and a
        // fresh token is signed by the new key
        assert!(service.verify(&token).is_ok());

        let new_token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@b.com", UserRole::User)
            .unwrap();
        let (new_id, _) = keys.current();
        assert_eq!(decode_header(&new_token).unwrap().kid, Some(new_id));
        assert!(service.verify(&new_token).is_ok());
    }

    #[test]
    fn test_old_tokens_fail_after_grace_window() {
        let service = service_with_grace(Duration::zero());
        let token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@b.com", UserRole::User)
            .unwrap();

        service.keys.rotate(MATERIAL_B).unwrap();

        assert!(matches!(
            service.verify(&token),
            Err(TokenError::UnknownKey)
        ));
    }

    #[test]
    fn test_expired_token_reports_expiry() {
        let keys = Arc::new(KeyProvider::new(MATERIAL_A, Duration::hours(24)).unwrap());
        let service = TokenService::new(
            TokenConfig {
                expiration_ms: 0,
                audience: "test.sentra.dev".to_string(),
                issuer: "test.sentra.dev".to_string(),
            },
            keys,
        );

        let token = service
            .issue(Uuid::new_v4(), Uuid::new_v4(), "a@b.com", UserRole::User)
            .unwrap();

        // exp == iat; wait for the clock to pass it (zero leeway)
        std::thread::sleep(std::time::Duration::from_millis(1500));
        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_expires_in_seconds() {
        let (service, _) = service();
        assert_eq!(service.expires_in_seconds(), 3600);
    }
}
