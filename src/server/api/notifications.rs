use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireActor;
use crate::server::AppState;
use crate::server::response::ApiError;

/// The calling user's notifications, newest first.
pub async fn list_notifications(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let notifications = state
        .store
        .list_notifications(&actor.organization_id, &actor.user_id)?;

    Ok::<_, ApiError>(Json(notifications))
}
