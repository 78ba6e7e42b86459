use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireActor;
use crate::lifecycle::{ConvertOptions, parse_bulk_rows, parse_tag_filter};
use crate::server::AppState;
use crate::server::dto::{
    BulkCreateRequest, BulkCreateResponse, ConvertLeadRequest, ConvertLeadResponse,
    CreateLeadRequest, ListLeadsParams, SuccessResponse, UpdateLeadRequest,
};
use crate::server::response::{ApiError, EngineResultExt};

pub async fn list_leads(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLeadsParams>,
) -> impl IntoResponse {
    let filter = params
        .tags
        .as_deref()
        .map(parse_tag_filter)
        .unwrap_or_default();

    let leads = state.engine.list_leads(&actor.organization_id, &filter)?;

    Ok::<_, ApiError>(Json(leads))
}

pub async fn get_lead(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let lead = state
        .engine
        .get_lead(&actor.organization_id, &id)
        .or_not_found("Lead not found")?;

    Ok::<_, ApiError>(Json(lead))
}

pub async fn create_lead(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLeadRequest>,
) -> impl IntoResponse {
    let lead = state.engine.create_lead(&actor, req.into())?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(lead)))
}

pub async fn bulk_create_leads(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkCreateRequest>,
) -> impl IntoResponse {
    let rows = parse_bulk_rows(&req.leads)?;
    let import = state.engine.bulk_create(&actor, rows)?;

    Ok::<_, ApiError>(Json(BulkCreateResponse::from(import)))
}

pub async fn update_lead(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateLeadRequest>,
) -> impl IntoResponse {
    let lead = state
        .engine
        .update_lead(&actor, &id, req.into())
        .or_not_found("Lead not found")?;

    Ok::<_, ApiError>(Json(lead))
}

pub async fn delete_lead(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state
        .engine
        .delete_lead(&actor, &id)
        .or_not_found("Lead not found")?;

    Ok::<_, ApiError>(Json(SuccessResponse { success: true }))
}

pub async fn convert_lead(
    RequireActor(actor): RequireActor,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    req: Option<Json<ConvertLeadRequest>>,
) -> impl IntoResponse {
    let options: ConvertOptions = req.map(|Json(r)| r).unwrap_or_default().into();

    let conversion = state
        .engine
        .convert_lead(&actor.organization_id, &id, options)
        .or_not_found("Lead not found")?;

    Ok::<_, ApiError>(Json(ConvertLeadResponse::from(conversion)))
}
