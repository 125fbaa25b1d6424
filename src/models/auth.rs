// Access token claims
// The subject is the user id; the signing key id travels in the token header,
// not in the claims.

use serde::{Deserialize, Serialize};

/// Claims carried by every access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User ID (subject)
    pub sub: String,

    /// JWT ID (UUID format)
    pub jti: String,

    /// Tenant the user belongs to
    pub tenant_id: String,

    /// User email address
    pub email: String,

    /// Role (ADMIN or USER)
    pub role: String,

    /// Audience
    pub aud: String,

    /// Issuer
    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}

impl AccessTokenClaims {
    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.exp < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_claims(iat: u64, exp: u64) -> AccessTokenClaims {
        AccessTokenClaims {
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            tenant_id: Uuid::new_v4().to_string(),
            email: "user@acme.com".to_string(),
            role: "ADMIN".to_string(),
            aud: "sentra.dev".to_string(),
            iss: "sentra.dev".to_string(),
            iat,
            exp,
        }
    }

    #[test]
    fn test_claims_serialization_round_trip() {
        let claims = sample_claims(1_700_000_000, 1_700_003_600);

        let json = serde_json::to_string(&claims).expect("Should serialize");
        let deserialized: AccessTokenClaims =
            serde_json::from_str(&json).expect("Should deserialize");

        assert_eq!(claims, deserialized);
    }

    #[test]
    fn test_claims_field_names() {
        let claims = sample_claims(0, 0);
        let value = serde_json::to_value(&claims).expect("Should serialize");
        let obj = value.as_object().expect("Should be object");

        for key in [
            "sub",
            "jti",
            "tenant_id",
            "email",
            "role",
            "aud",
            "iss",
            "iat",
            "exp",
        ] {
            assert!(obj.contains_key(key), "missing claim {}", key);
        }
        assert_eq!(obj.len(), 9);
    }

    #[test]
    fn test_expiry_check() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        assert!(sample_claims(now - 3600, now - 1).is_expired());
        assert!(!sample_claims(now, now + 3600).is_expired());
    }
}
