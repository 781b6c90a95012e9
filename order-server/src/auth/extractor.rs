//! JWT Extractor
//!
//! `CurrentUser` for protected handlers, `Option<CurrentUser>` for routes that
//! also accept anonymous callers (order creation).

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use crate::AppError;
use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::security_log;

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .map(Some)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header")),
        None => Ok(None),
    }
}

fn resolve(parts: &mut Parts, state: &ServerState, token: &str) -> Result<CurrentUser, AppError> {
    match state.jwt_service().validate_token(token) {
        Ok(claims) => {
            let user = CurrentUser::try_from(claims)
                .map_err(|e| AppError::invalid_token(format!("Malformed JWT claims: {}", e)))?;
            parts.extensions.insert(user);
            Ok(user)
        }
        Err(e) => {
            security_log!(
                "WARN",
                "auth_failed",
                error = format!("{}", e),
                uri = format!("{:?}", parts.uri)
            );

            match e {
                JwtError::ExpiredToken => Err(AppError::token_expired()),
                _ => Err(AppError::invalid_token("Invalid token")),
            }
        }
    }
}

impl FromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(*user);
        }

        let token = match bearer_token(parts)? {
            Some(token) => token.to_owned(),
            None => {
                security_log!("WARN", "auth_missing", uri = format!("{:?}", parts.uri));
                return Err(AppError::unauthorized());
            }
        };

        resolve(parts, state, &token)
    }
}

impl OptionalFromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(Some(*user));
        }

        // A present but broken credential is still rejected
        match bearer_token(parts)? {
            Some(token) => {
                let token = token.to_owned();
                resolve(parts, state, &token).map(Some)
            }
            None => Ok(None),
        }
    }
}
