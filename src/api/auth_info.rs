//! Authentication introspection endpoint

use axum::{Extension, Json};
use serde::Serialize;

use crate::middleware::auth::ApiKeyIdentity;

#[derive(Serialize)]
pub struct AuthInfoResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ApiKeyIdentity>,
}

/// Report the caller's authentication state
///
/// GET /auth/info
///
/// Authenticated callers get back the identity the middleware attached;
/// anonymous callers get `authenticated: false` rather than an error, so
/// clients can use this endpoint to verify a key without side effects.
pub async fn auth_info(identity: Option<Extension<ApiKeyIdentity>>) -> Json<AuthInfoResponse> {
    let identity = identity.map(|Extension(id)| id);

    Json(AuthInfoResponse {
        authenticated: identity.is_some(),
        identity,
    })
}
