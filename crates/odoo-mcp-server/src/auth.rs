//! Bearer authentication middleware for the MCP endpoint
//!
//! On success the request carries an `Arc<Principal>` extension. On failure:
//!
//! | Error class             | Status | `WWW-Authenticate`                            |
//! |-------------------------|--------|-----------------------------------------------|
//! | missing or malformed    | 401    | `Bearer realm, resource_metadata`             |
//! | token rejected          | 401    | the above plus `error="invalid_token"`        |
//! | upstream unreachable    | 503    | none                                          |

use crate::state::AppState;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use odoo_mcp_auth::{Principal, TokenError, TokenHash, extract_bearer_token};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rejection produced by [`authenticate`].
#[derive(Debug)]
struct AuthError {
    status: StatusCode,
    www_authenticate: Option<String>,
    body: Value,
}

impl AuthError {
    fn from_token_error(state: &AppState, error: &TokenError) -> Self {
        let status = error.status_code();
        let www_authenticate =
            (status == StatusCode::UNAUTHORIZED).then(|| state.resource_server.challenge(error));
        Self {
            status,
            www_authenticate,
            body: json!({
                "error": error.error_code(),
                "error_description": error.to_string(),
            }),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut resp = (self.status, Json(self.body)).into_response();

        if let Some(header_value) = self.www_authenticate
            && let Ok(value) = HeaderValue::from_str(&header_value)
        {
            resp.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }

        resp
    }
}

/// Validate the bearer token and attach the caller's [`Principal`].
///
/// In dev mode the configured development principal is attached without
/// looking at the request.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(principal) = &state.dev_principal {
        request.extensions_mut().insert(Arc::clone(principal));
        return next.run(request).await;
    }

    let authorization = match request.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(value) => Some(value.to_owned()),
            Err(_) => {
                return AuthError::from_token_error(&state, &TokenError::MalformedHeader).into_response();
            }
        },
    };

    match state.resource_server.authenticate(authorization.as_deref()).await {
        Ok(claims) => {
            let principal = Principal::from_claims(claims, &state.policy);
            debug!(
                subject = %principal.subject,
                scopes = principal.scopes.len(),
                "Request authenticated"
            );
            request.extensions_mut().insert(Arc::new(principal));
            next.run(request).await
        }
        Err(error) => {
            match extract_bearer_token(authorization.as_deref()) {
                Ok(token) => {
                    let hash = TokenHash::of(token);
                    warn!(
                        token_hash = %hash.prefix(),
                        token_len = token.len(),
                        error = %error,
                        "Bearer token rejected"
                    );
                }
                Err(_) => debug!(error = %error, "Request without usable bearer token"),
            }
            AuthError::from_token_error(&state, &error).into_response()
        }
    }
}

