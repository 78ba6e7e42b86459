use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireActor;
use crate::server::AppState;
use crate::server::response::ApiError;

pub async fn list_tags(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let tags = state.engine.list_tags(&actor.organization_id)?;

    Ok::<_, ApiError>(Json(tags))
}
