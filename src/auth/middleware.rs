use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::server::AppState;

/// Header carrying the caller's organization, set by the upstream auth proxy.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Header carrying the acting user's id, set by the upstream auth proxy.
pub const USER_HEADER: &str = "x-user-id";

/// The identity a request acts as. Every lead operation is scoped by `organization_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub organization_id: String,
    pub user_id: String,
}

impl Actor {
    pub fn new(organization_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Extractor that requires both identity headers and a known organization.
pub struct RequireActor(pub Actor);

#[derive(Debug)]
pub enum AuthError {
    MissingOrganization,
    MissingUser,
    UnknownOrganization,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingOrganization => {
                (StatusCode::UNAUTHORIZED, "Organization identity required")
            }
            AuthError::MissingUser => (StatusCode::UNAUTHORIZED, "User identity required"),
            AuthError::UnknownOrganization => (StatusCode::FORBIDDEN, "Unknown organization"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<Arc<AppState>> for RequireActor {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let organization_id =
            header_value(parts, ORGANIZATION_HEADER).ok_or(AuthError::MissingOrganization)?;
        let user_id = header_value(parts, USER_HEADER).ok_or(AuthError::MissingUser)?;

        state
            .store
            .get_organization(&organization_id)
            .map_err(|e| {
                tracing::error!("Failed to look up organization {organization_id}: {e}");
                AuthError::InternalError
            })?
            .ok_or(AuthError::UnknownOrganization)?;

        Ok(RequireActor(Actor {
            organization_id,
            user_id,
        }))
    }
}
