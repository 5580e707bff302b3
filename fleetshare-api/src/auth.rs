use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use crate::middleware::credentials::HostClaims;
use crate::state::AuthConfig;

/// Roles allowed to act on claims.
pub const HOST_ROLES: [&str; 2] = ["HOST", "PARTNER"];

/// Sign a host token the credential resolver accepts.
///
/// Sessions are issued by the identity service in production; this is the
/// same encoding, used by tooling and tests.
pub fn issue_host_token(
    auth: &AuthConfig,
    host_id: Uuid,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = HostClaims {
        sub: format!("host-{}", host_id),
        host_id,
        role: role.to_owned(),
        exp: expires_at(auth.expiration).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
}

/// Token expiry `lifetime_seconds` from now, clamped to the latest representable time.
fn expires_at(lifetime_seconds: u64) -> DateTime<Utc> {
    i64::try_from(lifetime_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
