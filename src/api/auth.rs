//! Actor resolution for every API request.
//!
//! - When `DEV_MODE=true`, the caller names itself with `X-Employee-Id: <uuid>`
//! - Otherwise requests carry `Authorization: Bearer <jwt>` whose `sub` is the employee id
//!
//! Tokens are issued elsewhere; this service only verifies them. The resolved
//! employee is inserted as an [`Actor`] request extension.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{DecodingKey, Validation};
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use crate::roster::Employee;

pub const EMPLOYEE_ID_HEADER: &str = "x-employee-id";

/// The authenticated employee making the request.
#[derive(Debug, Clone)]
pub struct Actor(pub Employee);

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Employee id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Work out which employee the request claims to be.
fn resolve_employee_id(
    headers: &HeaderMap,
    dev_mode: bool,
    jwt_secret: Option<&str>,
) -> Result<Uuid, (StatusCode, &'static str)> {
    if dev_mode {
        let raw = headers
            .get(EMPLOYEE_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing X-Employee-Id header"))?;
        return Uuid::parse_str(raw.trim())
            .map_err(|_| (StatusCode::BAD_REQUEST, "X-Employee-Id is not a valid id"));
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let secret = jwt_secret.ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "JWT_SECRET not configured",
    ))?;
    let token = bearer_token(headers)
        .ok_or((StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;
    let claims = verify_jwt(token, secret)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;
    Uuid::parse_str(&claims.sub).map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token subject"))
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let employee_id = match resolve_employee_id(
        req.headers(),
        state.config.dev_mode,
        state.config.auth.jwt_secret.as_deref(),
    ) {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    let employee = match state.store.get_employee(employee_id).await {
        Ok(Some(employee)) => employee,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "Unknown employee").into_response(),
        Err(e) => {
            tracing::error!("Failed to load employee {}: {}", employee_id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load employee").into_response();
        }
    };

    req.extensions_mut().insert(Actor(employee));
    next.run(req).await
}
