use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys};
use crate::{error::AppError, state::AppState};

/// Validated token claims of the caller.
#[derive(Debug)]
pub struct AuthUser(pub Claims);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

fn cookie_token<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        const OP: &str = "auth.extract_token";

        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers, &state.config.cookie.name))
            .ok_or(AppError::Unauthorized { op: OP })?;

        let claims = JwtKeys::from_ref(state).validate(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            AppError::Unauthorized { op: OP }
        })?;

        Ok(AuthUser(claims))
    }
}
