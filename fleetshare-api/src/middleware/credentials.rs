use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::HOST_ROLES;
use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HostClaims {
    pub sub: String,
    pub host_id: Uuid,
    pub role: String,
    pub exp: usize,
}

// ============================================================================
// Credential Sources
// ============================================================================

/// A place a host token may be carried in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    BearerHeader,
    Cookie(String),
}

impl CredentialSource {
    fn extract(&self, headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
        match self {
            CredentialSource::BearerHeader => headers
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
            CredentialSource::Cookie(name) => jar
                .get(name)
                .map(|c| c.value().to_owned())
                .filter(|t| !t.is_empty()),
        }
    }
}

/// Tries each source in order and returns the first one carrying a valid host
/// token. Legacy cookie names are just more entries in the list.
pub struct CredentialResolver {
    sources: Vec<CredentialSource>,
    key: DecodingKey,
    validation: Validation,
}

#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub host_id: Uuid,
    pub source: CredentialSource,
}

impl CredentialResolver {
    pub fn new(secret: &str, sources: Vec<CredentialSource>) -> Self {
        Self {
            sources,
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Bearer header first, then the configured cookies in order.
    pub fn from_config(auth: &AuthConfig) -> Self {
        let mut sources = vec![CredentialSource::BearerHeader];
        sources.extend(auth.cookie_names.iter().cloned().map(CredentialSource::Cookie));
        Self::new(&auth.secret, sources)
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Option<HostIdentity> {
        let jar = CookieJar::from_headers(headers);

        self.sources.iter().find_map(|source| {
            let token = source.extract(headers, &jar)?;
            let claims = self.verify(&token)?;
            Some(HostIdentity {
                host_id: claims.host_id,
                source: source.clone(),
            })
        })
    }

    fn verify(&self, token: &str) -> Option<HostClaims> {
        let data = decode::<HostClaims>(token, &self.key, &self.validation).ok()?;
        if !HOST_ROLES.contains(&data.claims.role.as_str()) {
            tracing::debug!(role = %data.claims.role, "Token role may not act on claims");
            return None;
        }
        Some(data.claims)
    }
}

impl FromRequestParts<AppState> for HostIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .credentials
            .resolve(&parts.headers)
            .ok_or_else(AppError::unauthorized)
    }
}
