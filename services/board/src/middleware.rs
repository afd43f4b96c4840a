//! Session middleware for protected routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{error::ApiError, models::SessionUser, state::AppState};

/// Logged-in user of the current request
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub sid: String,
    pub user: SessionUser,
}

/// Reject requests without a live session, otherwise expose it to handlers
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let jar = CookieJar::from_headers(req.headers());

    let (sid, user) = state
        .sessions
        .load_from_jar(&jar)
        .await?
        .ok_or_else(ApiError::login_required)?;

    req.extensions_mut().insert(CurrentSession { sid, user });

    Ok(next.run(req).await)
}
