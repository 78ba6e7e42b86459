use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireActor;
use crate::server::AppState;
use crate::server::response::{ApiError, StoreOptionExt};

pub async fn get_customer(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let customer = state
        .store
        .get_customer(&actor.organization_id, &id)?
        .or_not_found("Customer not found")?;

    Ok::<_, ApiError>(Json(customer))
}
