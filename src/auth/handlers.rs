use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{error, instrument};

use crate::{
    auth::dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Map a service rejection to a status and a message safe for the client.
pub(crate) fn reject(err: AuthError) -> (StatusCode, String) {
    let status = match &err {
        AuthError::InvalidUsername(_) | AuthError::InvalidPassword(_) => StatusCode::BAD_REQUEST,
        AuthError::UsernameTaken => StatusCode::CONFLICT,
        AuthError::UserNotFound | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, %status, "auth request failed");
    }
    (status, err.public_message())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    payload.username = payload.username.trim().to_string();

    let user = state
        .auth
        .register(&payload.username, &payload.password, payload.role.as_deref())
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.username = payload.username.trim().to_string();

    let user = state
        .auth
        .login(&payload.username, &payload.password)
        .await
        .map_err(reject)?;

    Ok(Json(AuthResponse { user: user.into() }))
}
