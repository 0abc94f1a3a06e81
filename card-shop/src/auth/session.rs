//! Session extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use http::HeaderMap;
use shared::error::AppError;

use crate::db::{self, sessions::Session};
use crate::state::AppState;

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "shop_session";

/// Value of cookie `name`, across every `Cookie` header
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve the request's session, caching it in the extensions.
pub(crate) async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<Session>, AppError> {
    if let Some(session) = parts.extensions.get::<Session>() {
        return Ok(Some(session.clone()));
    }
    let Some(session_id) = cookie_value(&parts.headers, SESSION_COOKIE) else {
        return Ok(None);
    };

    let now = shared::util::now_millis();
    let session = db::sessions::find_active(&state.pool, &session_id, now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session lookup failed");
            AppError::database("Session lookup failed")
        })?;
    if let Some(session) = &session {
        parts.extensions.insert(session.clone());
    }
    Ok(session)
}

/// The session if there is one; guests get `None`
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await?))
    }
}

/// A valid session, otherwise 401
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(session) => Ok(Self(session)),
            None => Err(AppError::not_authenticated()),
        }
    }
}
