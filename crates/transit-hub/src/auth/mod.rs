//! Bearer-token authentication and role checks for the agency API.

mod jwt;

use std::fmt;
use std::str::FromStr;

use axum::http::{header, HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::agencies::AgencyId;

pub use jwt::{Claims, JwtService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SystemAdmin,
    AgencyAdmin,
    StationManager,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::SystemAdmin => "system_admin",
            Role::AgencyAdmin => "agency_admin",
            Role::StationManager => "station_manager",
        }
    }

    pub const fn is_agency_scoped(self) -> bool {
        !matches!(self, Role::SystemAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "system_admin" => Ok(Role::SystemAdmin),
            "agency_admin" => Ok(Role::AgencyAdmin),
            "station_manager" => Ok(Role::StationManager),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

/// Authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
    pub agency_id: Option<AgencyId>,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            role: claims.role,
            agency_id: claims.agency_id,
        }
    }
}

impl Principal {
    pub fn require_system_admin(&self) -> Result<(), AuthError> {
        if self.role == Role::SystemAdmin {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// Write access: system administrators anywhere, agency administrators on their agency.
    pub fn require_agency_manager(&self, agency_id: &AgencyId) -> Result<(), AuthError> {
        match self.role {
            Role::SystemAdmin => Ok(()),
            Role::AgencyAdmin if self.agency_id.as_ref() == Some(agency_id) => Ok(()),
            _ => Err(AuthError::Forbidden),
        }
    }

    /// Read access: system administrators anywhere, any agency-scoped role on its agency.
    pub fn require_agency_reader(&self, agency_id: &AgencyId) -> Result<(), AuthError> {
        match self.role {
            Role::SystemAdmin => Ok(()),
            _ if self.agency_id.as_ref() == Some(agency_id) => Ok(()),
            _ => Err(AuthError::Forbidden),
        }
    }

    /// The agency bound to the token, for `/agency/me` style routes.
    pub fn own_agency(&self) -> Result<AgencyId, AuthError> {
        self.agency_id.ok_or(AuthError::Forbidden)
    }
}

/// Parse `Authorization: Bearer <token>` and verify it.
pub fn authenticate(headers: &HeaderMap, tokens: &JwtService) -> Result<Principal, AuthError> {
    let token = extract_bearer(headers)?;
    tokens.verify_token(token).map(Principal::from)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredentials)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingCredentials,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("insufficient permissions")]
    Forbidden,
    #[error("role '{0}' must be bound to an agency")]
    UnboundRole(Role),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("unable to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) | AuthError::UnboundRole(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UnknownRole(_) => StatusCode::BAD_REQUEST,
            AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
