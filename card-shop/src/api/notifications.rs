//! Buyer notifications

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::Notification;

use super::ApiResult;
use crate::auth::CurrentSession;
use crate::db;
use crate::error::ServiceError;
use crate::state::AppState;

const RECENT_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<NotificationList> {
    let items = db::notifications::list_recent(&state.pool, &session.user_id, RECENT_LIMIT)
        .await
        .map_err(ServiceError::from)?;
    let unread = db::notifications::count_unread(&state.pool, &session.user_id)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(NotificationList { items, unread }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
) -> ApiResult<MarkedRead> {
    let updated = db::notifications::mark_read(&state.pool, &session.user_id, id)
        .await
        .map_err(ServiceError::from)?;
    if !updated {
        return Err(AppError::with_message(ErrorCode::NotFound, "Notification not found"));
    }
    Ok(Json(MarkedRead { updated: 1 }))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<MarkedRead> {
    let updated = db::notifications::mark_all_read(&state.pool, &session.user_id)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(MarkedRead { updated }))
}
