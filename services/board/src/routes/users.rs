//! Account routes: registration, login, profile and password

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use tracing::{info, warn};

use super::parse_id;
use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentSession,
    models::{LoginRequest, NewUser, SessionUser, UpdatePasswordRequest},
    repositories::user::{hash_password, verify_password},
    state::AppState,
    storage::ImageKind,
    upload::ImageForm,
    validation::{validate_email, validate_password, validate_username},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form =
        ImageForm::parse(multipart, "profilePic", state.config.upload.max_file_bytes).await?;

    let (Some(email), Some(password), Some(username)) = (
        form.text("email").map(str::to_lowercase),
        form.text("password").map(str::to_string),
        form.text("username").map(str::to_string),
    ) else {
        return Err(ApiError::BadRequest("Please fill in every field".to_string()));
    };

    validate_email(&email).map_err(ApiError::BadRequest)?;
    validate_username(&username).map_err(ApiError::BadRequest)?;
    validate_password(&password).map_err(ApiError::BadRequest)?;

    if state.user_repository.email_exists(&email).await? {
        return Err(ApiError::BadRequest("Email is already registered".to_string()));
    }

    let image = form.store_file(&state.storage, ImageKind::Profile).await?;

    let new_user = NewUser {
        email,
        password_hash: hash_password(&password)?,
        username,
        image,
    };

    let user_id = match state.user_repository.create(&new_user).await {
        Ok(user_id) => user_id,
        Err(e) => {
            if let Some(image) = &new_user.image {
                state.storage.delete(ImageKind::Profile, image).await;
            }
            // a concurrent registration may win the unique email race
            if is_unique_violation(&e) {
                return Err(ApiError::BadRequest("Email is already registered".to_string()));
            }
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "userId": user_id,
        })),
    ))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation())
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    if !state.rate_limiter.is_allowed(&email).await {
        return Err(ApiError::TooManyRequests(
            "Too many login attempts, try again later".to_string(),
        ));
    }

    let Some(user) = state.user_repository.find_by_email(&email).await? else {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password(&payload.password, &user.password)? {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    state.rate_limiter.reset(&email).await;

    // drop any session the browser still carries
    if let Some(old_sid) = state.sessions.sid_from_jar(&jar) {
        if let Err(e) = state.sessions.destroy(&old_sid).await {
            warn!("Failed to drop previous session: {:#}", e);
        }
    }

    let session_user = SessionUser::from(&user);
    let sid = state.sessions.create(&session_user).await?;
    info!(user_id = user.id, "User logged in");

    Ok((
        jar.add(state.sessions.session_cookie(sid)),
        Json(json!({
            "message": "Login successful",
            "user": session_user,
        })),
    ))
}

/// `POST /api/logout`
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    if let Some(sid) = state.sessions.sid_from_jar(&jar) {
        state.sessions.destroy(&sid).await?;
    }

    Ok((
        jar.remove(state.sessions.removal_cookie()),
        Json(json!({ "message": "Logout successful" })),
    ))
}

/// `GET /api/check-session`
pub async fn check_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let response = match state.sessions.load_from_jar(&jar).await? {
        Some((_, user)) => (
            StatusCode::OK,
            Json(json!({ "loggedIn": true, "user": user })),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "loggedIn": false, "message": "Login required" })),
        ),
    };

    Ok(response)
}

/// `PUT /api/user/:userId`
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(user_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let user_id = parse_id(&user_id, "User")?;
    if user_id != session.user.id {
        return Err(ApiError::Forbidden(
            "You can only edit your own profile".to_string(),
        ));
    }

    let mut form =
        ImageForm::parse(multipart, "profilePic", state.config.upload.max_file_bytes).await?;

    let username = form.text("username").map(str::to_string);
    if let Some(username) = &username {
        validate_username(username).map_err(ApiError::BadRequest)?;
    }
    if username.is_none() && form.file.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let Some(current) = state.user_repository.find_by_id(user_id).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    let image = form.store_file(&state.storage, ImageKind::Profile).await?;

    let updated = state
        .user_repository
        .update_profile(user_id, username.as_deref(), image.as_deref())
        .await?;

    let Some(updated) = updated else {
        if let Some(image) = &image {
            state.storage.delete(ImageKind::Profile, image).await;
        }
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    if image.is_some() {
        if let Some(old_image) = &current.image {
            state.storage.delete(ImageKind::Profile, old_image).await;
        }
    }

    let session_user = SessionUser::from(&updated);
    state.sessions.update(&session.sid, &session_user).await?;
    state.post_cache.invalidate_all().await;
    info!(user_id, "Updated profile");

    Ok(Json(json!({
        "message": "Profile updated",
        "user": session_user,
    })))
}

/// `PATCH /api/user/password`
pub async fn update_password(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.new_password.is_empty() || payload.confirm_password.is_empty() {
        return Err(ApiError::BadRequest("Please fill in every field".to_string()));
    }
    if payload.new_password != payload.confirm_password {
        return Err(ApiError::BadRequest(
            "New password and confirmation do not match".to_string(),
        ));
    }
    validate_password(&payload.new_password).map_err(ApiError::BadRequest)?;

    let password_hash = hash_password(&payload.new_password)?;
    if !state
        .user_repository
        .update_password(session.user.id, &password_hash)
        .await?
    {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    // other devices must log in again with the new password
    state
        .sessions
        .revoke_user_sessions(session.user.id, Some(&session.sid))
        .await?;

    info!(user_id = session.user.id, "Changed password");
    Ok(Json(json!({ "message": "Password changed" })))
}

/// `DELETE /api/user/:userId`
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    jar: CookieJar,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user_id = parse_id(&user_id, "User")?;
    if user_id != session.user.id {
        return Err(ApiError::Forbidden(
            "You can only delete your own account".to_string(),
        ));
    }

    let Some(images) = state.user_repository.delete_with_posts(user_id).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    if let Some(profile_image) = &images.profile_image {
        state.storage.delete(ImageKind::Profile, profile_image).await;
    }
    for post_image in &images.post_images {
        state.storage.delete(ImageKind::Post, post_image).await;
    }

    if let Err(e) = state.sessions.revoke_user_sessions(user_id, None).await {
        warn!("Failed to revoke sessions of deleted user: {:#}", e);
    }
    state.post_cache.invalidate_all().await;

    Ok((
        jar.remove(state.sessions.removal_cookie()),
        Json(json!({ "message": "Account deleted" })),
    ))
}
