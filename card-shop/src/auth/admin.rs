//! Admin gate for `/api/admin`

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use shared::error::{AppError, ErrorCode};

use super::session::{SESSION_COOKIE, cookie_value};
use crate::db;
use crate::state::AppState;

/// Admin resolved by [`admin_middleware`]
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub user_id: String,
    pub username: String,
}

/// Require a live session whose username is listed in `ADMIN_USERS`.
pub async fn admin_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id =
        cookie_value(request.headers(), SESSION_COOKIE).ok_or_else(AppError::not_authenticated)?;

    let now = shared::util::now_millis();
    let session = db::sessions::find_active(&state.pool, &session_id, now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session lookup failed");
            AppError::database("Session lookup failed")
        })?
        .ok_or_else(|| AppError::new(ErrorCode::SessionExpired))?;

    if !state.config.is_admin(&session.username) {
        tracing::warn!(username = %session.username, uri = %request.uri(), "Admin access denied");
        return Err(AppError::new(ErrorCode::AdminRequired));
    }

    request.extensions_mut().insert(AdminIdentity {
        user_id: session.user_id.clone(),
        username: session.username.clone(),
    });
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
