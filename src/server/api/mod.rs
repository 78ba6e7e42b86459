mod customers;
mod leads;
mod notifications;
mod tags;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Leads
        .route("/leads", get(leads::list_leads).post(leads::create_lead))
        .route("/leads/bulk", post(leads::bulk_create_leads))
        .route(
            "/leads/{id}",
            get(leads::get_lead)
                .put(leads::update_lead)
                .delete(leads::delete_lead),
        )
        .route("/leads/{id}/convert", post(leads::convert_lead))
        // Tags
        .route("/tags", get(tags::list_tags))
        // Customers
        .route("/customers/{id}", get(customers::get_customer))
        // Notifications for the calling user
        .route("/notifications", get(notifications::list_notifications))
}
