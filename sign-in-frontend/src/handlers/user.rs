use crate::models::User;
use crate::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// The signed-in user, for client-side code that needs it.
pub async fn current_user(State(state): State<AppState>) -> Result<Json<User>, AppError> {
    state
        .users
        .current()
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("No user signed in")))
}
