use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthError, Role};
use crate::agencies::AgencyId;
use crate::config::AuthConfig;

/// JWT claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    /// Agency the principal acts for; absent for system administrators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<AgencyId>,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// Creates and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.issuer.clone(), config.token_ttl_hours)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a token for `subject`. Agency-scoped roles must name their agency.
    pub fn create_token(
        &self,
        subject: &str,
        role: Role,
        agency_id: Option<AgencyId>,
    ) -> Result<String, AuthError> {
        if role.is_agency_scoped() && agency_id.is_none() {
            return Err(AuthError::UnboundRole(role));
        }

        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            agency_id,
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    /// Verify signature, expiry, and issuer, returning the decoded claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;

        if claims.role.is_agency_scoped() && claims.agency_id.is_none() {
            return Err(AuthError::UnboundRole(claims.role));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_verify_token() {
        let service = JwtService::new("test_secret_key", "test_issuer", 24);
        let agency_id = AgencyId::new();

        let token = service
            .create_token("admin@agency", Role::AgencyAdmin, Some(agency_id))
            .expect("token signs");
        let claims = service.verify_token(&token).expect("token verifies");

        assert_eq!(claims.sub, "admin@agency");
        assert_eq!(claims.role, Role::AgencyAdmin);
        assert_eq!(claims.agency_id, Some(agency_id));
        assert_eq!(claims.iss, "test_issuer");
        let expires_in = claims.exp - Utc::now().timestamp();
        assert!(expires_in > 23 * 3600);
        assert!(expires_in <= 24 * 3600);
    }

    #[test]
    fn rejects_garbage_and_foreign_signatures() {
        let service = JwtService::new("secret1", "test_issuer", 24);
        let other = JwtService::new("secret2", "test_issuer", 24);

        assert!(matches!(
            service.verify_token("invalid_token"),
            Err(AuthError::InvalidToken(_))
        ));

        let token = other
            .create_token("root", Role::SystemAdmin, None)
            .expect("token signs");
        assert!(matches!(
            service.verify_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_other_issuers() {
        let service = JwtService::new("shared", "transit-hub", 24);
        let other = JwtService::new("shared", "someone-else", 24);
        let token = other
            .create_token("root", Role::SystemAdmin, None)
            .expect("token signs");
        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn agency_roles_must_be_bound() {
        let service = JwtService::new("secret", "transit-hub", 24);
        assert_eq!(
            service.create_token("manager", Role::StationManager, None),
            Err(AuthError::UnboundRole(Role::StationManager))
        );
    }
}
